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

//! Header line rules.
//!
//! A rule is a regex with the named groups `timestamp`, `level`, `thread`,
//! `logger` and (optionally) `message`, plus the chrono formats its timestamp
//! may be written in. New log dialects are added as data, the parsing loop
//! never changes.

use super::entry::LogLevel;
use crate::error::{AnalysisError, AnalysisResult};
use chrono::NaiveDateTime;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

const REQUIRED_GROUPS: [&str; 4] = ["timestamp", "level", "thread", "logger"];

/// Serializable description of a header rule, as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    pub timestamp_formats: Vec<String>,
}

impl RuleSpec {
    /// Tomcat / java.util.logging console format, any locale.
    ///
    /// `10-Jun-2025 08:26:46.310 심각 [http-nio-8080-exec-1] com.x.Y message`
    pub fn tomcat() -> Self {
        Self {
            name: "tomcat".to_string(),
            pattern: r"^(?P<timestamp>\d{2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2}:\d{2}\.\d{3}) (?P<level>\S+) \[(?P<thread>[^\]]+)\] (?P<logger>\S+)(?: (?P<message>.*))?$".to_string(),
            timestamp_formats: vec!["%d-%b-%Y %H:%M:%S%.3f".to_string()],
        }
    }

    /// ISO timestamped logback/log4j style.
    ///
    /// `2025-06-10 08:26:46.310 ERROR [main] com.x.Y - message`
    pub fn iso() -> Self {
        Self {
            name: "iso".to_string(),
            pattern: r"^(?P<timestamp>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?) +(?P<level>[A-Za-z]+) +\[(?P<thread>[^\]]+)\] +(?P<logger>\S+)(?: +-)?(?: (?P<message>.*))?$".to_string(),
            timestamp_formats: vec![
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
            ],
        }
    }
}

/// Fields pulled out of a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub thread: String,
    pub logger: String,
    pub message: String,
}

/// Outcome of testing one line against a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Not shaped like a header at all
    NotHeader,
    /// Shaped like a header, but the timestamp did not parse
    BadTimestamp(String),
    Header(HeaderFields),
}

/// A compiled [`RuleSpec`].
#[derive(Debug, Clone)]
pub struct HeaderRule {
    name: String,
    pattern: Regex,
    timestamp_formats: Vec<String>,
}

impl HeaderRule {
    pub fn compile(spec: &RuleSpec) -> AnalysisResult<Self> {
        let pattern = Regex::new(&spec.pattern).map_err(|e| {
            AnalysisError::invalid(format!("header rule '{}' has a bad pattern: {e}", spec.name))
        })?;

        let names: Vec<&str> = pattern.capture_names().flatten().collect();
        if let Some(missing) = REQUIRED_GROUPS.iter().find(|g| !names.contains(g)) {
            return Err(AnalysisError::invalid(format!(
                "header rule '{}' lacks the named group '{missing}'",
                spec.name
            )));
        }
        if spec.timestamp_formats.is_empty() {
            return Err(AnalysisError::invalid(format!(
                "header rule '{}' has no timestamp formats",
                spec.name
            )));
        }

        Ok(Self {
            name: spec.name.clone(),
            pattern,
            timestamp_formats: spec.timestamp_formats.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.replace(',', ".");
        self.timestamp_formats
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
    }

    fn match_line(&self, line: &str) -> HeaderMatch {
        let Ok(Some(caps)) = self.pattern.captures(line) else {
            return HeaderMatch::NotHeader;
        };
        let group = |name: &str| caps.name(name).map_or("", |m| m.as_str());

        let raw_ts = group("timestamp");
        let Some(timestamp) = self.parse_timestamp(raw_ts) else {
            return HeaderMatch::BadTimestamp(raw_ts.to_string());
        };

        HeaderMatch::Header(HeaderFields {
            timestamp,
            level: LogLevel::from_token(group("level")),
            thread: group("thread").to_string(),
            logger: group("logger").to_string(),
            message: group("message").trim_end().to_string(),
        })
    }
}

/// Ordered list of header rules. The first rule whose pattern matches decides.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<HeaderRule>,
}

impl RuleSet {
    pub fn compile(specs: &[RuleSpec]) -> AnalysisResult<Self> {
        if specs.is_empty() {
            return Err(AnalysisError::invalid("at least one header rule is required"));
        }
        let rules = specs
            .iter()
            .map(HeaderRule::compile)
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Built-in dialects: Tomcat first, ISO second.
    pub fn builtin() -> Self {
        let rules = [RuleSpec::tomcat(), RuleSpec::iso()]
            .iter()
            .filter_map(|spec| HeaderRule::compile(spec).ok())
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[HeaderRule] {
        &self.rules
    }

    pub fn match_header(&self, line: &str) -> HeaderMatch {
        for rule in &self.rules {
            match rule.match_line(line) {
                HeaderMatch::NotHeader => {}
                other => return other,
            }
        }
        HeaderMatch::NotHeader
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}
