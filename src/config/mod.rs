// TraceCrab - GPL-3.0-or-later
// This file is part of TraceCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// TraceCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// TraceCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with TraceCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::core::hotspot::Dimension;
use crate::error::{AnalysisError, AnalysisResult};
use crate::parser::entry::LogLevel;
use crate::parser::exception::ExceptionExtractor;
use crate::parser::rules::{RuleSet, RuleSpec};
use crate::parser::RecordParser;
use crate::source::sample::SampleDataset;
use chrono::{NaiveDateTime, TimeDelta};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Widest accepted time window, one leap year.
pub const MAX_WINDOW_SECS: i64 = 366 * 24 * 3600;

/// Everything an analysis run can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Width of a time-series window in seconds
    pub window_secs: i64,
    pub burst: BurstConfig,
    pub hotspot: HotspotConfig,
    pub filter: FilterConfig,
    /// Package prefixes treated as application code when resolving locations
    pub app_packages: Vec<String>,
    /// Header rules tried before the built-in dialects
    pub extra_rules: Vec<RuleSpec>,
    /// A (exception, location) pair must occur more often than this to count as repeating
    pub repeat_threshold: usize,
    pub max_patterns: usize,
    /// Named sample datasets for `--sample`
    pub datasets: Vec<SampleDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Level whose per-window counts are scanned
    pub level: LogLevel,
    /// Number of preceding windows averaged into the baseline
    pub trailing_windows: usize,
    pub multiplier: f64,
    /// Absolute count added to the threshold so tiny counts are not flagged
    pub min_floor: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    /// Each inner list is one grouping, e.g. `[location, exception_type]`
    pub groupings: Vec<Vec<Dimension>>,
    pub max_samples: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Exact fully qualified exception type
    pub exception_type: Option<String>,
    /// Inclusive lower bound
    pub start: Option<NaiveDateTime>,
    /// Inclusive upper bound
    pub end: Option<NaiveDateTime>,
    pub level: Option<LogLevel>,
    /// Regex searched in the thread name
    pub thread_pattern: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            burst: BurstConfig::default(),
            hotspot: HotspotConfig::default(),
            filter: FilterConfig::default(),
            app_packages: Vec::new(),
            extra_rules: Vec::new(),
            repeat_threshold: 5,
            max_patterns: 10,
            datasets: Vec::new(),
        }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Severe,
            trailing_windows: 6,
            multiplier: 2.0,
            min_floor: 3.0,
        }
    }
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            groupings: vec![
                vec![Dimension::Location],
                vec![Dimension::Thread],
                vec![Dimension::ExceptionType],
                vec![Dimension::TimeWindow],
                vec![Dimension::Location, Dimension::ExceptionType],
                vec![Dimension::Thread, Dimension::ExceptionType],
                vec![Dimension::TimeWindow, Dimension::ExceptionType],
            ],
            max_samples: 5,
        }
    }
}

impl AnalysisConfig {
    /// Path of the per-user default config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tracecrab").join("config.json"))
    }

    /// Load the per-user config, falling back to defaults if it is missing or broken.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring config at {}: {e}", path.display()),
                }
            } else {
                tracing::info!("No config found at {}, using defaults", path.display());
            }
        }
        Self::default()
    }

    pub fn load_from(path: &Path) -> AnalysisResult<Self> {
        tracing::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::invalid(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            AnalysisError::invalid(format!("cannot parse {}: {e}", path.display()))
        })
    }

    pub fn window(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.window_secs).unwrap_or(TimeDelta::MAX)
    }

    /// Check every tunable. Called once before any parsing or analysis work.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(1..=MAX_WINDOW_SECS).contains(&self.window_secs) {
            return Err(AnalysisError::invalid(format!(
                "window width must be between 1s and {MAX_WINDOW_SECS}s, got {}s",
                self.window_secs
            )));
        }
        self.burst.validate()?;
        self.hotspot.validate()?;
        self.filter.validate()?;
        if self.max_patterns == 0 {
            return Err(AnalysisError::invalid("max_patterns must be at least 1"));
        }
        Ok(())
    }

    /// Build the parser this config describes: extra rules first, then the built-ins.
    pub fn build_parser(&self) -> AnalysisResult<RecordParser> {
        let mut specs = self.extra_rules.clone();
        specs.extend([RuleSpec::tomcat(), RuleSpec::iso()]);
        let rules = RuleSet::compile(&specs)?;
        Ok(RecordParser::new(
            rules,
            ExceptionExtractor::new(self.app_packages.clone()),
        ))
    }
}

impl BurstConfig {
    fn validate(&self) -> AnalysisResult<()> {
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(AnalysisError::invalid(format!(
                "burst multiplier must be a non-negative number, got {}",
                self.multiplier
            )));
        }
        if !self.min_floor.is_finite() || self.min_floor < 0.0 {
            return Err(AnalysisError::invalid(format!(
                "burst floor must be a non-negative number, got {}",
                self.min_floor
            )));
        }
        if self.trailing_windows == 0 {
            return Err(AnalysisError::invalid(
                "burst baseline needs at least one trailing window",
            ));
        }
        Ok(())
    }
}

impl HotspotConfig {
    fn validate(&self) -> AnalysisResult<()> {
        if self.max_samples == 0 {
            return Err(AnalysisError::invalid("max_samples must be at least 1"));
        }
        if self.groupings.iter().any(Vec::is_empty) {
            return Err(AnalysisError::invalid(
                "every hotspot grouping needs at least one dimension",
            ));
        }
        Ok(())
    }
}

impl FilterConfig {
    fn validate(&self) -> AnalysisResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(AnalysisError::invalid(format!(
                    "time range start {start} is after end {end}"
                )));
            }
        }
        if let Some(pattern) = &self.thread_pattern {
            Regex::new(pattern).map_err(|e| {
                AnalysisError::invalid(format!("bad thread pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}
