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

//! Multi-dimensional grouping of entries, ranked by frequency.

use crate::core::histogram::TimeWindow;
use crate::parser::entry::LogEntry;
use chrono::TimeDelta;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key used for entries that have no value for a dimension.
pub const UNKNOWN_KEY: &str = "unknown";

/// Something entries can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Location,
    Thread,
    ExceptionType,
    TimeWindow,
    Logger,
    Level,
    Source,
}

impl Dimension {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Thread => "thread",
            Self::ExceptionType => "exception_type",
            Self::TimeWindow => "time_window",
            Self::Logger => "logger",
            Self::Level => "level",
            Self::Source => "source",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::Location,
            Self::Thread,
            Self::ExceptionType,
            Self::TimeWindow,
            Self::Logger,
            Self::Level,
            Self::Source,
        ]
        .into_iter()
        .find(|d| d.label() == label)
    }

    fn value_of(self, entry: &LogEntry, width_ms: i64) -> String {
        let value = match self {
            Self::Location => entry.source_location.as_ref().map(ToString::to_string),
            Self::Thread => Some(entry.thread.clone()),
            Self::ExceptionType => entry.exception_type.clone(),
            Self::TimeWindow => Some(
                TimeWindow::containing(entry.timestamp, width_ms)
                    .start
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            Self::Logger => Some(entry.logger.clone()),
            Self::Level => Some(entry.level.as_str().to_string()),
            Self::Source => Some(entry.source.clone()),
        };
        value
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_KEY.to_string())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entries sharing one dimension key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotGroup {
    /// One value per requested dimension, in the requested order
    pub key: Vec<String>,
    pub count: usize,
    /// Indices of the first few entries of the group in the analyzed sequence
    pub sample_entries: Vec<usize>,
}

/// All groups for one list of dimensions, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotTable {
    pub dimensions: Vec<Dimension>,
    pub groups: Vec<HotspotGroup>,
}

impl HotspotTable {
    /// Sum of all group counts. Always equals the number of grouped entries.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn title(&self) -> String {
        self.dimensions
            .iter()
            .map(|d| d.label())
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HotspotGrouper {
    width_ms: i64,
    max_samples: usize,
}

impl HotspotGrouper {
    pub fn new(window: TimeDelta, max_samples: usize) -> Self {
        Self {
            width_ms: window.num_milliseconds().max(1),
            max_samples,
        }
    }

    /// Group `entries` by `dimensions`.
    ///
    /// Groups are ordered by count, descending. Equal counts keep the order in
    /// which their keys were first seen.
    pub fn group(&self, entries: &[LogEntry], dimensions: &[Dimension]) -> HotspotTable {
        profiling::scope!("HotspotGrouper::group");

        let mut groups: IndexMap<Vec<String>, HotspotGroup> = IndexMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let key: Vec<String> = dimensions
                .iter()
                .map(|d| d.value_of(entry, self.width_ms))
                .collect();
            let group = groups.entry(key).or_insert_with_key(|key| HotspotGroup {
                key: key.clone(),
                count: 0,
                sample_entries: Vec::new(),
            });
            group.count += 1;
            if group.sample_entries.len() < self.max_samples {
                group.sample_entries.push(idx);
            }
        }

        let mut groups: Vec<HotspotGroup> = groups.into_values().collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count));

        HotspotTable {
            dimensions: dimensions.to_vec(),
            groups,
        }
    }
}
