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

use super::TIMESTAMP_FORMAT;
use crate::core::hotspot::HotspotTable;
use crate::parser::entry::LogEntry;
use std::borrow::Cow;
use std::fmt::Write;

const ENTRY_HEADER: &str = "timestamp,level,thread,logger,message,exception_type,exception_message,location,source,line_number\n";
const HOTSPOT_HEADER: &str = "grouping,key,count,percent\n";

/// RFC 4180 quoting: fields holding a comma, quote or line break are quoted
/// and inner quotes doubled.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One row per entry.
pub fn entries_to_csv(entries: &[LogEntry]) -> String {
    profiling::scope!("entries_to_csv");

    let mut out = String::from(ENTRY_HEADER);
    for entry in entries {
        let location = entry
            .source_location
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            entry.timestamp.format(TIMESTAMP_FORMAT),
            entry.level,
            escape(&entry.thread),
            escape(&entry.logger),
            escape(&entry.message),
            escape(entry.exception_type.as_deref().unwrap_or_default()),
            escape(entry.exception_message.as_deref().unwrap_or_default()),
            escape(&location),
            escape(&entry.source),
            entry.line_number,
        );
    }
    out
}

/// Every group of every table, tables in the given order.
///
/// Multi-dimension keys are joined with `" | "`.
pub fn hotspots_to_csv(tables: &[HotspotTable]) -> String {
    let mut out = String::from(HOTSPOT_HEADER);
    for table in tables {
        let title = table.title();
        let total = table.total().max(1) as f64;
        for group in &table.groups {
            let _ = writeln!(
                out,
                "{},{},{},{:.2}",
                escape(&title),
                escape(&group.key.join(" | ")),
                group.count,
                group.count as f64 * 100.0 / total,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hotspot::{Dimension, HotspotGroup};
    use crate::parser::entry::{LogLevel, SourceLocation};
    use chrono::NaiveDateTime;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_entry_rows() {
        let ts = NaiveDateTime::parse_from_str("2025-06-10 08:26:46.310", "%Y-%m-%d %H:%M:%S%.3f")
            .expect("valid timestamp");
        let mut entry = LogEntry::new(ts, LogLevel::Severe, "exec-1", "com.x.Y", "failed, retrying")
            .with_source("catalina.log", 12);
        entry.exception_type = Some("java.lang.NullPointerException".to_string());
        entry.source_location = Some(SourceLocation {
            class: "com.x.Y".to_string(),
            method: "run".to_string(),
            file: "Y.java".to_string(),
            line: 42,
        });

        let csv = entries_to_csv(&[entry]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], ENTRY_HEADER.trim_end());
        assert_eq!(
            lines[1],
            "2025-06-10 08:26:46.310,SEVERE,exec-1,com.x.Y,\"failed, retrying\",java.lang.NullPointerException,,com.x.Y (Y.java:42),catalina.log,12"
        );
    }

    #[test]
    fn test_hotspot_rows() {
        let table = HotspotTable {
            dimensions: vec![Dimension::Thread, Dimension::ExceptionType],
            groups: vec![
                HotspotGroup {
                    key: vec!["exec-1".to_string(), "x.AException".to_string()],
                    count: 3,
                    sample_entries: vec![0, 1, 2],
                },
                HotspotGroup {
                    key: vec!["exec-2".to_string(), "unknown".to_string()],
                    count: 1,
                    sample_entries: vec![3],
                },
            ],
        };
        let csv = hotspots_to_csv(&[table]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "thread+exception_type,exec-1 | x.AException,3,75.00");
        assert_eq!(lines[2], "thread+exception_type,exec-2 | unknown,1,25.00");
    }
}
