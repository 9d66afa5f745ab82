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

//! Multi-line record reconstruction.
//!
//! Lines are scanned once. A header line closes the entry being built and opens
//! a new one; every other line is a continuation of the open entry. This is how
//! stack traces end up attached to their record without a multi-line regex.

pub mod entry;
pub mod exception;
pub mod rules;

use entry::LogEntry;
use exception::ExceptionExtractor;
use rayon::prelude::*;
use rules::{HeaderMatch, RuleSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const BOM: char = '\u{feff}';

/// Decoded text of one logical source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Counters describing what the parser had to skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Physical lines read
    pub lines: usize,
    /// Entries produced
    pub entries: usize,
    /// Non-blank lines before the first header
    pub malformed_lines: usize,
    /// Header-shaped lines whose timestamp did not parse
    pub unparseable_timestamps: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: &Self) {
        self.lines += other.lines;
        self.entries += other.entries;
        self.malformed_lines += other.malformed_lines;
        self.unparseable_timestamps += other.unparseable_timestamps;
    }

    pub const fn is_clean(&self) -> bool {
        self.malformed_lines == 0 && self.unparseable_timestamps == 0
    }
}

/// Parsed entries plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub entries: Vec<LogEntry>,
    pub stats: ParseStats,
}

/// Turns raw log text into [`LogEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct RecordParser {
    rules: RuleSet,
    extractor: ExceptionExtractor,
}

impl RecordParser {
    pub fn new(rules: RuleSet, extractor: ExceptionExtractor) -> Self {
        Self { rules, extractor }
    }

    pub const fn extractor(&self) -> &ExceptionExtractor {
        &self.extractor
    }

    /// Parse one source. Never fails; anomalies are counted in the stats.
    ///
    /// The result is sorted by timestamp. Records with equal timestamps keep
    /// their order of appearance.
    pub fn parse(&self, text: &str, source: &str) -> ParseOutcome {
        profiling::scope!("RecordParser::parse");

        let mut stats = ParseStats::default();
        let mut entries = Vec::new();
        let mut pending: Option<LogEntry> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            stats.lines += 1;
            let line = clean_line(raw_line);

            match self.rules.match_header(line) {
                HeaderMatch::Header(fields) => {
                    if let Some(done) = pending.take() {
                        entries.push(self.extractor.enrich(done));
                    }
                    pending = Some(
                        LogEntry::new(
                            fields.timestamp,
                            fields.level,
                            fields.thread,
                            fields.logger,
                            fields.message,
                        )
                        .with_source(source, idx + 1),
                    );
                }
                // Malformed timestamps are far more often wrapped content than
                // real records, so the line stays with the open entry.
                HeaderMatch::BadTimestamp(raw_ts) => {
                    stats.unparseable_timestamps += 1;
                    debug!("{source}:{}: unparseable timestamp '{raw_ts}'", idx + 1);
                    if let Some(entry) = pending.as_mut() {
                        entry.stack_trace.push(line.to_string());
                    }
                }
                HeaderMatch::NotHeader => {
                    if let Some(entry) = pending.as_mut() {
                        entry.stack_trace.push(line.to_string());
                    } else if !line.trim().is_empty() {
                        stats.malformed_lines += 1;
                        debug!("{source}:{}: line before first record skipped", idx + 1);
                    }
                }
            }
        }

        if let Some(done) = pending {
            entries.push(self.extractor.enrich(done));
        }

        entries.sort_by_key(|e| e.timestamp);
        stats.entries = entries.len();

        if !stats.is_clean() {
            warn!(
                "{source}: skipped {} malformed line(s), {} unparseable timestamp(s)",
                stats.malformed_lines, stats.unparseable_timestamps
            );
        }
        debug!("{source}: {} lines -> {} entries", stats.lines, stats.entries);

        ParseOutcome { entries, stats }
    }

    /// Parse several independent sources in parallel and merge them.
    ///
    /// Sources are merged in the order given and then stably sorted by
    /// timestamp, so ties are broken by source order, then line order.
    pub fn parse_sources(&self, sources: &[SourceText]) -> ParseOutcome {
        profiling::scope!("RecordParser::parse_sources");

        let outcomes: Vec<ParseOutcome> = sources
            .par_iter()
            .map(|s| self.parse(&s.text, &s.name))
            .collect();

        let mut merged = ParseOutcome::default();
        for outcome in outcomes {
            merged.stats.merge(&outcome.stats);
            merged.entries.extend(outcome.entries);
        }
        merged.entries.sort_by_key(|e| e.timestamp);
        merged
    }
}

fn clean_line(line: &str) -> &str {
    line.trim_start_matches(BOM).trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use entry::{LogLevel, SourceLocation};

    const SAMPLE: &str = "10-Jun-2025 08:26:46.310 심각 [t1] com.x.Y boom\nnested exception is java.lang.NullPointerException: oops\n\tat com.x.Y.run(Y.java:42)\n10-Jun-2025 08:27:00.000 정보 [t1] com.x.Y ok";

    fn parse(text: &str) -> ParseOutcome {
        RecordParser::default().parse(text, "test.log")
    }

    #[test]
    fn test_reference_scenario() {
        let outcome = parse(SAMPLE);
        assert_eq!(outcome.entries.len(), 2);

        let first = &outcome.entries[0];
        assert_eq!(first.level, LogLevel::Severe);
        assert_eq!(first.message, "boom");
        assert_eq!(
            first.exception_type.as_deref(),
            Some("java.lang.NullPointerException")
        );
        assert_eq!(first.exception_message.as_deref(), Some("oops"));
        assert_eq!(
            first.source_location,
            Some(SourceLocation {
                class: "com.x.Y".to_string(),
                method: "run".to_string(),
                file: "Y.java".to_string(),
                line: 42,
            })
        );
        assert_eq!(first.stack_trace.len(), 2);
        assert_eq!(first.line_number, 1);

        let second = &outcome.entries[1];
        assert_eq!(second.level, LogLevel::Info);
        assert_eq!(second.exception_type, None);
        assert!(second.stack_trace.is_empty());
        assert_eq!(second.line_number, 4);
        assert!(outcome.stats.is_clean());
    }

    #[test]
    fn test_empty_input() {
        let outcome = parse("");
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.stats, ParseStats::default());
    }

    #[test]
    fn test_continuation_lines_keep_order() {
        let text = "10-Jun-2025 08:00:00.000 심각 [t] a.B first\nline one\n\tline two\n\nline four\n10-Jun-2025 08:00:01.000 정보 [t] a.B second";
        let outcome = parse(text);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(
            outcome.entries[0].stack_trace,
            vec!["line one", "\tline two", "", "line four"]
        );
        assert!(outcome.entries[1].stack_trace.is_empty());
    }

    #[test]
    fn test_malformed_prefix_is_counted_and_dropped() {
        let text = "garbage\n\nmore garbage\n10-Jun-2025 08:00:00.000 정보 [t] a.B hello";
        let outcome = parse(text);
        assert_eq!(outcome.entries.len(), 1);
        assert!(outcome.entries[0].stack_trace.is_empty());
        assert_eq!(outcome.stats.malformed_lines, 2);
        assert_eq!(outcome.stats.lines, 4);
    }

    #[test]
    fn test_bad_timestamp_becomes_continuation() {
        let text = "10-Jun-2025 08:00:00.000 심각 [t] a.B first\n31-Feb-2025 08:00:01.000 심각 [t] a.B wrapped\n10-Jun-2025 08:00:02.000 정보 [t] a.B next";
        let outcome = parse(text);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(
            outcome.entries[0].stack_trace,
            vec!["31-Feb-2025 08:00:01.000 심각 [t] a.B wrapped"]
        );
        assert_eq!(outcome.stats.unparseable_timestamps, 1);
        assert_eq!(outcome.stats.malformed_lines, 0);
    }

    #[test]
    fn test_bad_timestamp_before_first_record_is_dropped() {
        let text = "99-Jun-2025 08:00:00.000 심각 [t] a.B lost\n10-Jun-2025 08:00:02.000 정보 [t] a.B kept";
        let outcome = parse(text);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].message, "kept");
        assert_eq!(outcome.stats.unparseable_timestamps, 1);
        assert_eq!(outcome.stats.malformed_lines, 0);
    }

    #[test]
    fn test_bom_and_carriage_returns_are_stripped() {
        let text = "\u{feff}10-Jun-2025 08:00:00.000 심각 [t] a.B boom\r\n\tat a.B.c(B.java:7)\r\n";
        let outcome = parse(text);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].message, "boom");
        assert_eq!(outcome.entries[0].stack_trace, vec!["\tat a.B.c(B.java:7)"]);
        assert_eq!(
            outcome.entries[0].source_location.as_ref().map(|l| l.line),
            Some(7)
        );
    }

    #[test]
    fn test_out_of_order_records_sorted_stably() {
        let text = "10-Jun-2025 09:00:00.000 정보 [t] a.B late\n10-Jun-2025 08:00:00.000 정보 [t] a.B early-1\n10-Jun-2025 08:00:00.000 정보 [t] a.B early-2";
        let outcome = parse(text);
        let messages: Vec<&str> = outcome.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["early-1", "early-2", "late"]);
    }

    #[test]
    fn test_parse_sources_merges_in_source_order() {
        let sources = vec![
            SourceText::new("a.log", "10-Jun-2025 08:00:00.000 정보 [t] a.B from-a"),
            SourceText::new(
                "b.log",
                "junk\n10-Jun-2025 08:00:00.000 정보 [t] a.B from-b\n10-Jun-2025 07:00:00.000 정보 [t] a.B earliest",
            ),
        ];
        let outcome = RecordParser::default().parse_sources(&sources);
        let messages: Vec<&str> = outcome.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["earliest", "from-a", "from-b"]);
        assert_eq!(outcome.entries[0].source, "b.log");
        assert_eq!(outcome.stats.entries, 3);
        assert_eq!(outcome.stats.malformed_lines, 1);
    }
}
