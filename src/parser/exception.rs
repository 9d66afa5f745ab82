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

//! Exception type and source location extraction.

use super::entry::{LogEntry, SourceLocation};
use fancy_regex::Regex;
use std::sync::LazyLock;

// Fully qualified Java class name whose simple name looks like a throwable
macro_rules! fqn {
    () => {
        r"(?:[A-Za-z_$][\w$]*\.)+[A-Za-z_$][\w$]*(?:Exception|Error|Throwable)"
    };
}

// `com.x.FooException: detail` anywhere in the message line
static MESSAGE_EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r"(?<![\w$.])(?P<name>", fqn!(), r"):\s*(?P<detail>.*)$"))
        .expect("valid regex literal")
});

// `nested exception is com.x.FooException[: detail]`
static NESTED_EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"nested exception is (?P<name>",
        fqn!(),
        r")(?::\s*(?P<detail>.*))?"
    ))
    .expect("valid regex literal")
});

// A stack line that is just the exception: `com.x.FooException: detail`,
// `Caused by: com.x.FooException` or the bare name
static BARE_EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:Caused by:\s*)?(?P<name>",
        fqn!(),
        r")(?::\s*(?P<detail>.*)|\s*$)"
    ))
    .expect("valid regex literal")
});

// `at [module/]com.x.Y.run(Y.java:42)`
static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*at\s+(?:[^\s/()]*/)*(?P<class>[\w$.]+)\.(?P<method>[\w$<>]+)\((?P<file>[^:()]+):(?P<line>\d+)\)",
    )
    .expect("valid regex literal")
});

/// What could be learned about the exception behind an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub location: Option<SourceLocation>,
}

/// Pulls the exception type and the first application frame out of an entry.
#[derive(Debug, Clone, Default)]
pub struct ExceptionExtractor {
    /// Package prefixes that count as application code. Empty accepts all frames.
    app_packages: Vec<String>,
}

impl ExceptionExtractor {
    pub fn new(app_packages: Vec<String>) -> Self {
        let app_packages = app_packages
            .into_iter()
            .map(|p| p.trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { app_packages }
    }

    pub fn extract(&self, message: &str, stack_trace: &[String]) -> ExceptionInfo {
        let (exception_type, exception_message) = Self::find_exception(message, stack_trace)
            .map_or((None, None), |(name, detail)| (Some(name), detail));

        ExceptionInfo {
            exception_type,
            exception_message,
            location: self.find_location(stack_trace),
        }
    }

    /// Fill the derived exception fields of a freshly built entry.
    pub fn enrich(&self, mut entry: LogEntry) -> LogEntry {
        let info = self.extract(&entry.message, &entry.stack_trace);
        entry.exception_type = info.exception_type;
        entry.exception_message = info.exception_message;
        entry.source_location = info.location;
        entry
    }

    fn find_exception(message: &str, stack_trace: &[String]) -> Option<(String, Option<String>)> {
        capture_exception(&MESSAGE_EXCEPTION, message)
            .or_else(|| {
                stack_trace
                    .iter()
                    .find_map(|line| capture_exception(&NESTED_EXCEPTION, line))
            })
            .or_else(|| {
                stack_trace
                    .iter()
                    .find_map(|line| capture_exception(&BARE_EXCEPTION, line))
            })
    }

    fn find_location(&self, stack_trace: &[String]) -> Option<SourceLocation> {
        stack_trace.iter().find_map(|line| {
            let caps = STACK_FRAME.captures(line).ok().flatten()?;
            let class = caps.name("class")?.as_str();
            if !self.is_application_class(class) {
                return None;
            }
            Some(SourceLocation {
                class: class.to_string(),
                method: caps.name("method")?.as_str().to_string(),
                file: caps.name("file")?.as_str().to_string(),
                line: caps.name("line")?.as_str().parse().ok()?,
            })
        })
    }

    fn is_application_class(&self, class: &str) -> bool {
        self.app_packages.is_empty()
            || self.app_packages.iter().any(|prefix| {
                class == prefix
                    || class
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    }
}

fn capture_exception(pattern: &Regex, line: &str) -> Option<(String, Option<String>)> {
    let caps = pattern.captures(line).ok().flatten()?;
    let name = caps.name("name")?.as_str().to_string();
    let detail = caps
        .name("detail")
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty());
    Some((name, detail))
}
