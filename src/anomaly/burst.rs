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

//! Burst detection against a trailing moving average.
//!
//! A window is anomalous when `count > baseline * multiplier + floor`, where
//! the baseline is the mean of up to `trailing_windows` preceding windows.
//! The very first window has no history and is never flagged. Runs of
//! anomalous windows are merged into one [`BurstInterval`].

use crate::config::BurstConfig;
use crate::core::histogram::{TimeSeries, TimeWindow};
use crate::parser::entry::LogLevel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A contiguous run of anomalous windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstInterval {
    pub window_start: NaiveDateTime,
    /// End of the last window of the run (exclusive)
    pub window_end: NaiveDateTime,
    /// Entries observed over the whole run
    pub observed_count: usize,
    /// Sum of the per-window baselines over the run
    pub baseline_count: f64,
    /// `observed_count / max(baseline_count, 1)`
    pub severity: f64,
    pub windows: usize,
    pub peak_count: usize,
}

/// How one window was judged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowVerdict {
    pub window: TimeWindow,
    pub count: usize,
    /// `None` for the first window, which has no history
    pub baseline: Option<f64>,
    pub anomalous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstDetector {
    trailing_windows: usize,
    multiplier: f64,
    min_floor: f64,
}

impl BurstDetector {
    pub const fn new(trailing_windows: usize, multiplier: f64, min_floor: f64) -> Self {
        Self {
            trailing_windows,
            multiplier,
            min_floor,
        }
    }

    pub const fn from_config(config: &BurstConfig) -> Self {
        Self::new(config.trailing_windows, config.multiplier, config.min_floor)
    }

    /// Judge every window of a series ordered by window index.
    ///
    /// Windows missing from `series` count as zero. The baseline of window `i`
    /// is the sum over indices `[i - K, i)` divided by the number of those
    /// indices that lie at or after the first window, so gaps are never
    /// materialized.
    pub fn evaluate(&self, series: &[(TimeWindow, usize)]) -> Vec<WindowVerdict> {
        let Some(&(first, _)) = series.first() else {
            return Vec::new();
        };
        let trailing = i64::try_from(self.trailing_windows.max(1)).unwrap_or(i64::MAX);

        let mut lo = 0usize;
        let mut history_sum = 0usize;

        series
            .iter()
            .enumerate()
            .map(|(pos, &(window, count))| {
                let horizon = window.index.saturating_sub(trailing);
                while lo < pos && series[lo].0.index < horizon {
                    history_sum -= series[lo].1;
                    lo += 1;
                }

                let span = trailing.min(window.index.saturating_sub(first.index));
                let baseline = (span > 0).then(|| history_sum as f64 / span as f64);
                let anomalous = baseline
                    .is_some_and(|b| count as f64 > b.mul_add(self.multiplier, self.min_floor));

                history_sum += count;

                WindowVerdict {
                    window,
                    count,
                    baseline,
                    anomalous,
                }
            })
            .collect()
    }

    /// Burst intervals of a series ordered by window index.
    ///
    /// Only flagged windows with adjacent indices are merged into one run.
    pub fn detect(&self, series: &[(TimeWindow, usize)]) -> Vec<BurstInterval> {
        profiling::scope!("BurstDetector::detect");

        let mut bursts = Vec::new();
        let mut current: Option<(i64, BurstInterval)> = None;

        for verdict in self.evaluate(series) {
            let adjacent = current
                .as_ref()
                .is_some_and(|(last, _)| last.checked_add(1) == Some(verdict.window.index));
            if !verdict.anomalous || !adjacent {
                if let Some((_, done)) = current.take() {
                    bursts.push(done);
                }
            }
            if !verdict.anomalous {
                continue;
            }
            let baseline = verdict.baseline.unwrap_or(0.0);
            let (last, burst) = current.get_or_insert_with(|| {
                (
                    verdict.window.index,
                    BurstInterval {
                        window_start: verdict.window.start,
                        window_end: verdict.window.end,
                        observed_count: 0,
                        baseline_count: 0.0,
                        severity: 0.0,
                        windows: 0,
                        peak_count: 0,
                    },
                )
            });
            *last = verdict.window.index;
            burst.window_end = verdict.window.end;
            burst.observed_count += verdict.count;
            burst.baseline_count += baseline;
            burst.windows += 1;
            burst.peak_count = burst.peak_count.max(verdict.count);
        }
        if let Some((_, done)) = current {
            bursts.push(done);
        }

        for burst in &mut bursts {
            burst.severity = burst.observed_count as f64 / burst.baseline_count.max(1.0);
        }
        bursts
    }

    /// Burst intervals of one level of a time series.
    pub fn detect_in(&self, series: &TimeSeries, level: LogLevel) -> Vec<BurstInterval> {
        self.detect(&series.level_counts(level))
    }
}

impl Default for BurstDetector {
    fn default() -> Self {
        Self::from_config(&BurstConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(counts: &[usize]) -> Vec<(TimeWindow, usize)> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (TimeWindow::from_index(480_000 + i as i64, 3_600_000), c))
            .collect()
    }

    #[test]
    fn test_first_window_never_flagged() {
        let detector = BurstDetector::new(6, 2.0, 3.0);
        let verdicts = detector.evaluate(&series(&[1000]));
        assert_eq!(verdicts[0].baseline, None);
        assert!(!verdicts[0].anomalous);
    }

    #[test]
    fn test_single_spike() {
        let detector = BurstDetector::new(3, 2.0, 3.0);
        let bursts = detector.detect(&series(&[2, 2, 2, 20, 2, 2]));
        assert_eq!(bursts.len(), 1);
        let burst = &bursts[0];
        assert_eq!(burst.windows, 1);
        assert_eq!(burst.observed_count, 20);
        assert!((burst.baseline_count - 2.0).abs() < 1e-9);
        assert!((burst.severity - 10.0).abs() < 1e-9);
        assert_eq!(
            burst.window_end - burst.window_start,
            chrono::TimeDelta::hours(1)
        );
    }

    #[test]
    fn test_consecutive_windows_merge() {
        let detector = BurstDetector::new(2, 2.0, 1.0);
        // baselines: -, 1, 1, 5.5, 15
        let bursts = detector.detect(&series(&[1, 1, 10, 20, 1]));
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].windows, 2);
        assert_eq!(bursts[0].observed_count, 30);
        assert_eq!(bursts[0].peak_count, 20);
        assert!((bursts[0].baseline_count - 6.5).abs() < 1e-9);
    }

    #[test]
    fn test_floor_suppresses_small_counts() {
        let detector = BurstDetector::new(6, 2.0, 3.0);
        // 0 history -> threshold 3.0, 3 is not above it
        assert!(detector.detect(&series(&[0, 0, 3])).is_empty());
        assert_eq!(detector.detect(&series(&[0, 0, 4])).len(), 1);
    }

    #[test]
    fn test_short_history_uses_what_exists() {
        let detector = BurstDetector::new(6, 2.0, 0.0);
        let verdicts = detector.evaluate(&series(&[4, 9]));
        assert_eq!(verdicts[1].baseline, Some(4.0));
        assert!(verdicts[1].anomalous);
    }

    #[test]
    fn test_baseline_uses_only_trailing_windows() {
        let detector = BurstDetector::new(2, 1.0, 0.0);
        let verdicts = detector.evaluate(&series(&[100, 1, 1, 2]));
        assert_eq!(verdicts[3].baseline, Some(1.0));
        assert!(verdicts[3].anomalous);
    }

    #[test]
    fn test_empty_series() {
        assert!(BurstDetector::default().detect(&[]).is_empty());
    }

    fn sparse(windows: &[(i64, usize)]) -> Vec<(TimeWindow, usize)> {
        windows
            .iter()
            .map(|&(i, c)| (TimeWindow::from_index(480_000 + i, 3_600_000), c))
            .collect()
    }

    #[test]
    fn test_gaps_count_as_empty_windows() {
        let detector = BurstDetector::new(4, 2.0, 0.0);
        // windows 1 and 2 are missing: baseline of 3 is (8 + 0 + 0) / 3
        let verdicts = detector.evaluate(&sparse(&[(0, 8), (3, 6)]));
        assert_eq!(verdicts.len(), 2);
        let baseline = verdicts[1].baseline.expect("has history");
        assert!((baseline - 8.0 / 3.0).abs() < 1e-9);
        assert!(verdicts[1].anomalous);

        // once the only populated window has left the horizon the baseline is zero
        let verdicts = detector.evaluate(&sparse(&[(0, 8), (10, 1)]));
        assert_eq!(verdicts[1].baseline, Some(0.0));
    }

    #[test]
    fn test_sparse_matches_zero_filled() {
        let detector = BurstDetector::new(3, 1.5, 1.0);
        let dense = series(&[2, 0, 0, 9, 1, 0, 12, 14]);
        let gappy: Vec<_> = dense.iter().copied().filter(|&(_, c)| c > 0).collect();

        let from_dense: Vec<_> = detector
            .evaluate(&dense)
            .into_iter()
            .filter(|v| v.count > 0)
            .collect();
        assert_eq!(detector.evaluate(&gappy), from_dense);
        assert_eq!(detector.detect(&gappy), detector.detect(&dense));
    }

    #[test]
    fn test_flagged_windows_across_gap_do_not_merge() {
        let detector = BurstDetector::new(1, 1.0, 0.0);
        let bursts = detector.detect(&sparse(&[(0, 1), (1, 5), (3, 5)]));
        assert_eq!(bursts.len(), 2);
        assert!(bursts.iter().all(|b| b.windows == 1));
    }

    #[test]
    fn test_distant_windows_stay_sparse() {
        let detector = BurstDetector::new(6, 2.0, 3.0);
        // one-second windows, 2024-01-01 and 2025-06-10
        let far = vec![
            (TimeWindow::from_index(1_704_067_200, 1000), 1),
            (TimeWindow::from_index(1_749_513_600, 1000), 50),
        ];
        let verdicts = detector.evaluate(&far);
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[1].baseline, Some(0.0));
        let bursts = detector.detect(&far);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].observed_count, 50);
    }
}
