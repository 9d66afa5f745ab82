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

//! Entry filtering ahead of aggregation.
//!
//! All criteria are optional and combined with AND. Filtering produces a new
//! sequence; the input is left untouched.

use crate::config::FilterConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::parser::entry::{LogEntry, LogLevel};
use chrono::NaiveDateTime;
use fancy_regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    exception_type: Option<String>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    level: Option<LogLevel>,
    thread_pattern: Option<Regex>,
}

impl EntryFilter {
    pub fn from_config(config: &FilterConfig) -> AnalysisResult<Self> {
        let thread_pattern = config
            .thread_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| AnalysisError::invalid(format!("bad thread pattern '{p}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            exception_type: config.exception_type.clone(),
            start: config.start,
            end: config.end,
            level: config.level,
            thread_pattern,
        })
    }

    pub const fn is_empty(&self) -> bool {
        self.exception_type.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.level.is_none()
            && self.thread_pattern.is_none()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(wanted) = &self.exception_type {
            if entry.exception_type.as_ref() != Some(wanted) {
                return false;
            }
        }
        if self.start.is_some_and(|start| entry.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.timestamp > end) {
            return false;
        }
        if self.level.is_some_and(|level| entry.level != level) {
            return false;
        }
        self.thread_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&entry.thread).unwrap_or(false))
    }

    /// The matching entries, in their original order.
    pub fn apply(&self, entries: &[LogEntry]) -> Vec<LogEntry> {
        profiling::scope!("EntryFilter::apply");

        if self.is_empty() {
            return entries.to_vec();
        }
        entries.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}
