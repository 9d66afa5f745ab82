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

//! The result of one analysis run.

use crate::anomaly::{BurstInterval, RepeatingPattern};
use crate::core::histogram::{TimeSeries, WindowCounts};
use crate::parser::entry::{LogEntry, LogLevel};
use crate::parser::ParseStats;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::hotspot::HotspotTable;

const TOP_N: usize = 10;

/// Everything computed from one batch of entries.
///
/// Export and display code reads these fields and never recomputes them from
/// the raw entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Entries that passed the filters, in timestamp order
    pub entries: Vec<LogEntry>,
    pub time_series: TimeSeries,
    pub bursts: Vec<BurstInterval>,
    /// One table per configured grouping
    pub hotspots: Vec<HotspotTable>,
    pub repeating: Vec<RepeatingPattern>,
    pub summary: Summary,
    /// Present when the report was built from raw text
    pub parse_stats: Option<ParseStats>,
}

impl AnalysisReport {
    #[must_use]
    pub const fn with_parse_stats(mut self, stats: ParseStats) -> Self {
        self.parse_stats = Some(stats);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub total: usize,
    pub errors: usize,
}

impl From<&WindowCounts> for WindowSummary {
    fn from(counts: &WindowCounts) -> Self {
        Self {
            start: counts.window.start,
            end: counts.window.end,
            total: counts.total,
            errors: counts.level(LogLevel::Severe),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedKey {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_entries: usize,
    /// Entries at SEVERE level
    pub error_count: usize,
    /// `error_count / total_entries`, 0 for an empty batch
    pub error_rate: f64,
    /// Errors per hour of covered time; spans under one hour count as one hour
    pub errors_per_hour: f64,
    pub distinct_exception_types: usize,
    /// Distinct source files among resolved locations
    pub affected_files: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub busiest_window: Option<WindowSummary>,
    pub quietest_window: Option<WindowSummary>,
    pub top_exceptions: Vec<CountedKey>,
    pub top_locations: Vec<CountedKey>,
}

impl Summary {
    pub fn compute(entries: &[LogEntry], series: &TimeSeries) -> Self {
        profiling::scope!("Summary::compute");

        if entries.is_empty() {
            return Self::default();
        }

        let total_entries = entries.len();
        let error_count = entries.iter().filter(|e| e.level.is_error()).count();

        let first_timestamp = entries.iter().map(|e| e.timestamp).min();
        let last_timestamp = entries.iter().map(|e| e.timestamp).max();
        let span_hours = first_timestamp.zip(last_timestamp).map_or(0.0, |(first, last)| {
            (last - first).num_milliseconds() as f64 / 3_600_000.0
        });

        let exceptions = count_ranked(entries.iter().filter_map(|e| e.exception_type.clone()));
        let locations = count_ranked(
            entries
                .iter()
                .filter(|e| e.exception_type.is_some())
                .filter_map(|e| e.source_location.as_ref().map(ToString::to_string)),
        );
        let affected_files: BTreeSet<&str> = entries
            .iter()
            .filter_map(|e| e.source_location.as_ref().map(|l| l.file.as_str()))
            .collect();

        Self {
            total_entries,
            error_count,
            error_rate: error_count as f64 / total_entries as f64,
            errors_per_hour: error_count as f64 / span_hours.max(1.0),
            distinct_exception_types: exceptions.len(),
            affected_files: affected_files.len(),
            first_timestamp,
            last_timestamp,
            busiest_window: series.busiest().map(WindowSummary::from),
            quietest_window: series.quietest().map(WindowSummary::from),
            top_exceptions: exceptions.into_iter().take(TOP_N).collect(),
            top_locations: locations.into_iter().take(TOP_N).collect(),
        }
    }
}

/// Count keys, most frequent first, ties in first-seen order.
fn count_ranked(keys: impl Iterator<Item = String>) -> Vec<CountedKey> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<CountedKey> = counts
        .into_iter()
        .map(|(key, count)| CountedKey { key, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::entry::SourceLocation;
    use chrono::TimeDelta;

    fn entry(at: &str, level: LogLevel, exception: Option<&str>, file: Option<&str>) -> LogEntry {
        let ts = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").expect("valid timestamp");
        let mut e = LogEntry::new(ts, level, "t", "l", "m");
        e.exception_type = exception.map(ToString::to_string);
        e.source_location = file.map(|f| SourceLocation {
            class: "a.B".to_string(),
            method: "run".to_string(),
            file: f.to_string(),
            line: 1,
        });
        e
    }

    #[test]
    fn test_summary_counts() {
        let entries = vec![
            entry("2025-06-10 08:00:00", LogLevel::Severe, Some("x.AException"), Some("A.java")),
            entry("2025-06-10 08:30:00", LogLevel::Info, None, None),
            entry("2025-06-10 09:10:00", LogLevel::Severe, Some("x.BException"), Some("B.java")),
            entry("2025-06-10 10:00:00", LogLevel::Severe, Some("x.BException"), Some("B.java")),
        ];
        let series = TimeSeries::compute(&entries, TimeDelta::hours(1));
        let summary = Summary::compute(&entries, &series);

        assert_eq!(summary.total_entries, 4);
        assert_eq!(summary.error_count, 3);
        assert!((summary.error_rate - 0.75).abs() < 1e-9);
        assert!((summary.errors_per_hour - 1.5).abs() < 1e-9);
        assert_eq!(summary.distinct_exception_types, 2);
        assert_eq!(summary.affected_files, 2);
        assert_eq!(summary.top_exceptions[0].key, "x.BException");
        assert_eq!(summary.top_exceptions[0].count, 2);
        assert_eq!(summary.top_locations[0].key, "a.B (B.java:1)");

        let busiest = summary.busiest_window.expect("busiest window");
        assert_eq!(busiest.total, 2);
        assert_eq!(busiest.errors, 1);
    }

    #[test]
    fn test_short_span_counts_as_one_hour() {
        let entries = vec![
            entry("2025-06-10 08:00:00", LogLevel::Severe, None, None),
            entry("2025-06-10 08:00:10", LogLevel::Severe, None, None),
        ];
        let series = TimeSeries::compute(&entries, TimeDelta::hours(1));
        let summary = Summary::compute(&entries, &series);
        assert!((summary.errors_per_hour - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::compute(&[], &TimeSeries::empty(TimeDelta::hours(1)));
        assert_eq!(summary, Summary::default());
    }
}
