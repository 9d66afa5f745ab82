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

//! Orchestrates one analysis run.
//!
//! The stages always run in the same order: filter, time series, bursts,
//! hotspots, summary. Repeating patterns are derived from the filtered entries
//! alongside the hotspots. Nothing here keeps state between runs, so
//! independent runs can be spread across the rayon pool.

use crate::anomaly::{BurstDetector, RepeatingDetector};
use crate::config::AnalysisConfig;
use crate::core::filter::EntryFilter;
use crate::core::histogram::TimeSeries;
use crate::core::hotspot::{HotspotGrouper, HotspotTable};
use crate::core::report::{AnalysisReport, Summary};
use crate::error::AnalysisResult;
use crate::parser::entry::LogEntry;
use crate::parser::{RecordParser, SourceText};
use crate::source::sample::SampleDataProvider;
use crate::source::FetchedLogs;
use rayon::prelude::*;
use tracing::{debug, info};

/// A validated configuration plus the parser and filter built from it.
#[derive(Debug, Clone)]
pub struct ErrorAnalyzer {
    config: AnalysisConfig,
    parser: RecordParser,
    filter: EntryFilter,
}

impl ErrorAnalyzer {
    /// Validate `config` and compile everything derived from it.
    ///
    /// This is the only place an analysis can fail; once built, every
    /// `analyze*` call succeeds.
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let parser = config.build_parser()?;
        let filter = EntryFilter::from_config(&config.filter)?;
        Ok(Self {
            config,
            parser,
            filter,
        })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub const fn parser(&self) -> &RecordParser {
        &self.parser
    }

    pub fn analyze(&self, entries: &[LogEntry]) -> AnalysisReport {
        profiling::scope!("ErrorAnalyzer::analyze");

        let mut filtered = self.filter.apply(entries);
        filtered.sort_by_key(|e| e.timestamp);
        debug!("{} of {} entries passed the filters", filtered.len(), entries.len());

        let window = self.config.window();
        let time_series = TimeSeries::compute(&filtered, window);

        let bursts = BurstDetector::from_config(&self.config.burst)
            .detect_in(&time_series, self.config.burst.level);

        let grouper = HotspotGrouper::new(window, self.config.hotspot.max_samples);
        let hotspots: Vec<HotspotTable> = self
            .config
            .hotspot
            .groupings
            .iter()
            .map(|dims| grouper.group(&filtered, dims))
            .collect();

        let repeating =
            RepeatingDetector::new(self.config.repeat_threshold, self.config.max_patterns)
                .detect(&filtered);

        let summary = Summary::compute(&filtered, &time_series);
        info!(
            "Analyzed {} entries: {} errors, {} burst(s), {} repeating pattern(s)",
            summary.total_entries,
            summary.error_count,
            bursts.len(),
            repeating.len()
        );

        AnalysisReport {
            entries: filtered,
            time_series,
            bursts,
            hotspots,
            repeating,
            summary,
            parse_stats: None,
        }
    }

    /// Parse one text and analyze it, keeping the parse diagnostics.
    pub fn analyze_text(&self, text: &str, source: &str) -> AnalysisReport {
        let outcome = self.parser.parse(text, source);
        self.analyze(&outcome.entries).with_parse_stats(outcome.stats)
    }

    /// Parse several texts in parallel and analyze them as one batch.
    pub fn analyze_sources(&self, sources: &[SourceText]) -> AnalysisReport {
        let outcome = self.parser.parse_sources(sources);
        self.analyze(&outcome.entries).with_parse_stats(outcome.stats)
    }

    /// Analyze whatever a log source returned.
    pub fn analyze_fetched(&self, fetched: &FetchedLogs) -> AnalysisReport {
        match fetched {
            FetchedLogs::Text(sources) => self.analyze_sources(sources),
            FetchedLogs::Entries(entries) => self.analyze(entries),
        }
    }

    /// Independent runs, one report per batch, in input order.
    pub fn analyze_batches(&self, batches: &[Vec<LogEntry>]) -> Vec<AnalysisReport> {
        profiling::scope!("ErrorAnalyzer::analyze_batches");
        batches.par_iter().map(|b| self.analyze(b)).collect()
    }

    /// Load a named dataset from `provider` and analyze it.
    pub fn analyze_sample(
        &self,
        provider: &dyn SampleDataProvider,
        name: &str,
    ) -> AnalysisResult<AnalysisReport> {
        info!("Analyzing sample dataset '{name}'");
        let fetched = provider.load(name)?;
        Ok(self.analyze_fetched(&fetched))
    }
}

/// One-shot analysis of an entry batch.
pub fn analyze(entries: &[LogEntry], config: &AnalysisConfig) -> AnalysisResult<AnalysisReport> {
    Ok(ErrorAnalyzer::new(config.clone())?.analyze(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hotspot::Dimension;
    use crate::error::AnalysisError;
    use crate::parser::entry::LogLevel;
    use crate::source::sample::SampleDataset;
    use chrono::NaiveDateTime;

    const SAMPLE: &str = "10-Jun-2025 08:26:46.310 심각 [t1] com.x.Y boom\nnested exception is java.lang.NullPointerException: oops\n\tat com.x.Y.run(Y.java:42)\n10-Jun-2025 08:27:00.000 정보 [t1] com.x.Y ok";

    fn analyzer() -> ErrorAnalyzer {
        ErrorAnalyzer::new(AnalysisConfig::default()).expect("default config is valid")
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid timestamp")
    }

    #[test]
    fn test_reference_report() {
        let report = analyzer().analyze_text(SAMPLE, "catalina.log");

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.summary.total_entries, 2);
        assert_eq!(report.summary.error_count, 1);
        assert!((report.summary.error_rate - 0.5).abs() < 1e-9);
        assert_eq!(report.summary.distinct_exception_types, 1);
        assert_eq!(report.time_series.len(), 1);
        assert!(report.bursts.is_empty());
        assert_eq!(report.parse_stats.map(|s| s.entries), Some(2));

        let by_exception = report
            .hotspots
            .iter()
            .find(|t| t.dimensions == vec![Dimension::ExceptionType])
            .expect("exception table");
        assert_eq!(by_exception.groups[0].key, vec!["java.lang.NullPointerException"]);
        assert_eq!(by_exception.groups[1].key, vec!["unknown"]);
        assert_eq!(by_exception.groups[1].sample_entries, vec![1]);
        assert_eq!(by_exception.total(), 2);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let analyzer = analyzer();
        let entries = analyzer.parser().parse(SAMPLE, "a.log").entries;
        assert_eq!(analyzer.analyze(&entries), analyzer.analyze(&entries));
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = analyzer().analyze(&[]);
        assert!(report.entries.is_empty());
        assert!(report.time_series.is_empty());
        assert!(report.bursts.is_empty());
        assert!(report.repeating.is_empty());
        assert!(report.hotspots.iter().all(|t| t.groups.is_empty()));
        assert_eq!(report.summary, Summary::default());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = AnalysisConfig {
            window_secs: -5,
            ..AnalysisConfig::default()
        };
        let err = analyze(&[], &config).expect_err("negative window");
        assert!(matches!(err, AnalysisError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_filter_runs_before_aggregation() {
        let mut config = AnalysisConfig::default();
        config.filter.level = Some(LogLevel::Severe);
        let analyzer = ErrorAnalyzer::new(config).expect("valid config");
        let entries = analyzer.parser().parse(SAMPLE, "a.log").entries;

        let report = analyzer.analyze(&entries);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.summary.total_entries, 1);
        assert!(report.hotspots.iter().all(|t| t.total() == 1));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_narrow_windows_over_long_span() {
        let config = AnalysisConfig {
            window_secs: 1,
            ..AnalysisConfig::default()
        };
        let entries = vec![
            LogEntry::new(ts("2024-01-01 00:00:00"), LogLevel::Severe, "t", "l", "old"),
            LogEntry::new(ts("2025-06-10 08:00:00"), LogLevel::Severe, "t", "l", "new"),
        ];
        let report = analyze(&entries, &config).expect("valid config");
        assert_eq!(report.time_series.len(), 2);
        assert!(report.bursts.is_empty());
        assert_eq!(report.summary.total_entries, 2);
    }

    #[test]
    fn test_unsorted_entries_are_ordered() {
        let entries = vec![
            LogEntry::new(ts("2025-06-10 10:00:00"), LogLevel::Info, "t", "l", "late"),
            LogEntry::new(ts("2025-06-10 08:00:00"), LogLevel::Info, "t", "l", "early"),
        ];
        let report = analyzer().analyze(&entries);
        assert_eq!(report.entries[0].message, "early");
        assert_eq!(report.time_series.len(), 2);
    }

    #[test]
    fn test_burst_surfaces_in_report() {
        let mut entries = Vec::new();
        for hour in 0..6 {
            entries.push(LogEntry::new(
                ts(&format!("2025-06-10 0{hour}:00:00")),
                LogLevel::Severe,
                "t",
                "l",
                "steady",
            ));
        }
        for minute in 0..20 {
            entries.push(LogEntry::new(
                ts(&format!("2025-06-10 06:{minute:02}:00")),
                LogLevel::Severe,
                "t",
                "l",
                "spike",
            ));
        }
        let report = analyzer().analyze(&entries);
        assert_eq!(report.bursts.len(), 1);
        assert_eq!(report.bursts[0].window_start, ts("2025-06-10 06:00:00"));
        assert_eq!(report.bursts[0].observed_count, 20);
    }

    #[test]
    fn test_batches_are_independent() {
        let analyzer = analyzer();
        let a = analyzer.parser().parse(SAMPLE, "a.log").entries;
        let b = vec![LogEntry::new(ts("2025-06-11 00:00:00"), LogLevel::Info, "t", "l", "b")];
        let reports = analyzer.analyze_batches(&[a.clone(), b.clone()]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0], analyzer.analyze(&a));
        assert_eq!(reports[1], analyzer.analyze(&b));
    }

    struct InMemory;

    impl SampleDataProvider for InMemory {
        fn datasets(&self) -> Vec<SampleDataset> {
            Vec::new()
        }

        fn load(&self, name: &str) -> AnalysisResult<FetchedLogs> {
            match name {
                "demo" => Ok(FetchedLogs::Text(vec![SourceText::new("demo.log", SAMPLE)])),
                other => Err(AnalysisError::UnknownDataset(other.to_string())),
            }
        }
    }

    #[test]
    fn test_sample_provider_is_caller_supplied() {
        let analyzer = analyzer();
        let report = analyzer.analyze_sample(&InMemory, "demo").expect("known dataset");
        assert_eq!(report.summary.total_entries, 2);
        assert!(matches!(
            analyzer.analyze_sample(&InMemory, "missing"),
            Err(AnalysisError::UnknownDataset(_))
        ));
    }
}
