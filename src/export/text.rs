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

//! Plain-text rendering for the terminal.

use super::TIMESTAMP_FORMAT;
use crate::core::hotspot::Dimension;
use crate::core::report::{AnalysisReport, WindowSummary};
use std::fmt::Write;

const RULE: &str = "==================================================";
const DETAIL_ROWS: usize = 20;

fn window_line(label: &str, window: Option<&WindowSummary>) -> String {
    window.map_or_else(
        || format!("{label}: -"),
        |w| {
            format!(
                "{label}: {} ({} entries, {} errors)",
                w.start.format(TIMESTAMP_FORMAT),
                w.total,
                w.errors
            )
        },
    )
}

/// Headline numbers, top exceptions and anomaly counts.
pub fn render_summary(report: &AnalysisReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "ANALYSIS SUMMARY");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Total Entries: {}", s.total_entries);
    let _ = writeln!(out, "Total Errors: {}", s.error_count);
    let _ = writeln!(out, "Error Share: {:.1}%", s.error_rate * 100.0);
    let _ = writeln!(out, "Unique Error Types: {}", s.distinct_exception_types);
    let _ = writeln!(out, "Affected Files: {}", s.affected_files);
    let _ = writeln!(out, "Error Rate: {:.2} errors/hour", s.errors_per_hour);

    if !s.top_exceptions.is_empty() {
        let _ = writeln!(out, "\nTop Error Types:");
        for counted in s.top_exceptions.iter().take(5) {
            let _ = writeln!(out, "  - {}: {} occurrences", counted.key, counted.count);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", window_line("Busiest Window", s.busiest_window.as_ref()));
    let _ = writeln!(out, "{}", window_line("Quietest Window", s.quietest_window.as_ref()));

    if !report.bursts.is_empty() {
        let _ = writeln!(out, "\nDetected {} error burst(s)", report.bursts.len());
    }
    if !report.repeating.is_empty() {
        let _ = writeln!(
            out,
            "Detected {} repeating error pattern(s)",
            report.repeating.len()
        );
    }
    if let Some(stats) = report.parse_stats.filter(|p| !p.is_clean()) {
        let _ = writeln!(
            out,
            "\nSkipped {} malformed line(s) and {} unparseable timestamp(s)",
            stats.malformed_lines, stats.unparseable_timestamps
        );
    }
    out
}

/// The summary followed by every burst, repeating pattern and the
/// location/exception breakdown.
pub fn render_detailed(report: &AnalysisReport) -> String {
    let mut out = render_summary(report);

    if !report.bursts.is_empty() {
        let _ = writeln!(out, "\nBursts:");
        for burst in &report.bursts {
            let _ = writeln!(
                out,
                "  {} .. {}  observed {}  baseline {:.1}  severity {:.1}x",
                burst.window_start.format(TIMESTAMP_FORMAT),
                burst.window_end.format(TIMESTAMP_FORMAT),
                burst.observed_count,
                burst.baseline_count,
                burst.severity
            );
        }
    }

    if !report.repeating.is_empty() {
        let _ = writeln!(out, "\nRepeating Patterns:");
        for pattern in &report.repeating {
            let _ = writeln!(
                out,
                "  {} at {}: {} times",
                pattern.exception_type, pattern.location, pattern.count
            );
        }
    }

    let breakdown = report
        .hotspots
        .iter()
        .find(|t| t.dimensions == [Dimension::Location, Dimension::ExceptionType])
        .or_else(|| report.hotspots.first());
    if let Some(table) = breakdown {
        let _ = writeln!(out, "\nDetailed Error Breakdown ({}):", table.title());
        for group in table.groups.iter().take(DETAIL_ROWS) {
            let _ = writeln!(out, "  {:>6}  {}", group.count, group.key.join(" | "));
        }
    }
    out
}
