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

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a log record, normalized across locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Severe,
    Unknown,
}

impl LogLevel {
    /// Map a level token as written by the server to a level.
    ///
    /// Covers the Korean JUL/Tomcat tokens as well as the usual English ones.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "정보" => Self::Info,
            "경고" => Self::Warning,
            "심각" => Self::Severe,
            "디버그" | "상세" => Self::Debug,
            other => match other.to_uppercase().as_str() {
                "INFO" | "I" | "CONFIG" => Self::Info,
                "WARNING" | "WARN" | "W" => Self::Warning,
                "SEVERE" | "ERROR" | "ERR" | "FATAL" | "E" | "F" => Self::Severe,
                "DEBUG" | "FINE" | "FINER" | "FINEST" | "TRACE" | "D" => Self::Debug,
                _ => Self::Unknown,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Severe => "SEVERE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub const fn is_error(self) -> bool {
        matches!(self, Self::Severe)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first application stack frame of an exception.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub class: String,
    pub method: String,
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.class, self.file, self.line)
    }
}

/// One reconstructed log record: a header line plus its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub thread: String,
    pub logger: String,
    /// Message text of the header line
    pub message: String,
    /// Continuation lines, verbatim and in source order
    pub stack_trace: Vec<String>,
    /// Fully qualified exception class, if one could be found
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub source_location: Option<SourceLocation>,
    /// Logical source (file name or archive member) this entry was read from
    pub source: String,
    /// 1-based line number of the header line within `source`
    pub line_number: usize,
}

impl LogEntry {
    pub fn new(
        timestamp: NaiveDateTime,
        level: LogLevel,
        thread: impl Into<String>,
        logger: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            thread: thread.into(),
            logger: logger.into(),
            message: message.into(),
            stack_trace: Vec::new(),
            exception_type: None,
            exception_message: None,
            source_location: None,
            source: String::new(),
            line_number: 0,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>, line_number: usize) -> Self {
        self.source = source.into();
        self.line_number = line_number;
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, lines: Vec<String>) -> Self {
        self.stack_trace = lines;
        self
    }

    /// Header line followed by the stack trace, reassembled for display.
    pub fn raw(&self) -> String {
        let mut raw = format!(
            "{} {} [{}] {} {}",
            self.timestamp.format("%d-%b-%Y %H:%M:%S%.3f"),
            self.level,
            self.thread,
            self.logger,
            self.message
        );
        for line in &self.stack_trace {
            raw.push('\n');
            raw.push_str(line);
        }
        raw
    }
}
