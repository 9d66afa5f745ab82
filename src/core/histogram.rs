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

//! Fixed-width time series over log entries.
//!
//! A window is `[start, start + width)`, identified by its index
//! `floor(millis since Unix epoch / width)`. The index depends only on the
//! entry's own timestamp, so bucketing is the same regardless of input order.

use crate::parser::entry::{LogEntry, LogLevel};
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub index: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn from_index(index: i64, width_ms: i64) -> Self {
        let start = DateTime::from_timestamp_millis(index.saturating_mul(width_ms))
            .map(|dt| dt.naive_utc())
            .unwrap_or_default();
        let end = start
            .checked_add_signed(TimeDelta::milliseconds(width_ms))
            .unwrap_or(start);
        Self { index, start, end }
    }

    pub fn containing(ts: NaiveDateTime, width_ms: i64) -> Self {
        Self::from_index(window_index(ts, width_ms), width_ms)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Window index of a timestamp for a window width in milliseconds.
pub fn window_index(ts: NaiveDateTime, width_ms: i64) -> i64 {
    ts.and_utc().timestamp_millis().div_euclid(width_ms)
}

/// Counts of one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub window: TimeWindow,
    pub total: usize,
    pub by_level: BTreeMap<LogLevel, usize>,
    pub by_exception: BTreeMap<String, usize>,
}

impl WindowCounts {
    fn new(window: TimeWindow) -> Self {
        Self {
            window,
            total: 0,
            by_level: BTreeMap::new(),
            by_exception: BTreeMap::new(),
        }
    }

    pub fn level(&self, level: LogLevel) -> usize {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    /// Share of entries in this window at error level.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.level(LogLevel::Severe) as f64 / self.total as f64
        }
    }
}

/// Windows that hold at least one entry, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub width_ms: i64,
    pub windows: Vec<WindowCounts>,
}

impl TimeSeries {
    /// Bucket `entries` in one pass. `width` must be positive.
    pub fn compute(entries: &[LogEntry], width: TimeDelta) -> Self {
        profiling::scope!("TimeSeries::compute");

        let width_ms = width.num_milliseconds().max(1);
        let mut buckets: BTreeMap<i64, WindowCounts> = BTreeMap::new();

        for entry in entries {
            let index = window_index(entry.timestamp, width_ms);
            let counts = buckets
                .entry(index)
                .or_insert_with(|| WindowCounts::new(TimeWindow::from_index(index, width_ms)));
            counts.total += 1;
            *counts.by_level.entry(entry.level).or_insert(0) += 1;
            if let Some(exception) = &entry.exception_type {
                *counts.by_exception.entry(exception.clone()).or_insert(0) += 1;
            }
        }

        Self {
            width_ms,
            windows: buckets.into_values().collect(),
        }
    }

    pub fn empty(width: TimeDelta) -> Self {
        Self {
            width_ms: width.num_milliseconds().max(1),
            windows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// The populated window containing `ts`, if any.
    pub fn window_of(&self, ts: NaiveDateTime) -> Option<&WindowCounts> {
        let index = window_index(ts, self.width_ms);
        self.windows
            .binary_search_by_key(&index, |w| w.window.index)
            .ok()
            .map(|pos| &self.windows[pos])
    }

    /// Per-window counts of one level over the populated windows, in order.
    ///
    /// Windows without entries are left out; consumers treat them as zero.
    pub fn level_counts(&self, level: LogLevel) -> Vec<(TimeWindow, usize)> {
        self.windows
            .iter()
            .map(|c| (c.window, c.level(level)))
            .collect()
    }

    /// Window with the most entries; the earliest one wins ties.
    pub fn busiest(&self) -> Option<&WindowCounts> {
        self.windows
            .iter()
            .reduce(|best, w| if w.total > best.total { w } else { best })
    }

    /// Populated window with the fewest entries; the earliest one wins ties.
    pub fn quietest(&self) -> Option<&WindowCounts> {
        self.windows
            .iter()
            .reduce(|best, w| if w.total < best.total { w } else { best })
    }
}
