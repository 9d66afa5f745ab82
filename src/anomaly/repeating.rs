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

use crate::core::hotspot::{Dimension, HotspotGrouper};
use crate::parser::entry::LogEntry;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// The same exception thrown from the same place over and over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatingPattern {
    pub exception_type: String,
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RepeatingDetector {
    threshold: usize,
    max_patterns: usize,
}

impl RepeatingDetector {
    pub const fn new(threshold: usize, max_patterns: usize) -> Self {
        Self {
            threshold,
            max_patterns,
        }
    }

    /// (exception, location) pairs seen more than `threshold` times, most
    /// frequent first. Entries without an exception type are ignored.
    pub fn detect(&self, entries: &[LogEntry]) -> Vec<RepeatingPattern> {
        let with_exception: Vec<LogEntry> = entries
            .iter()
            .filter(|e| e.exception_type.is_some())
            .cloned()
            .collect();

        // Samples are not needed here; the window width is irrelevant.
        HotspotGrouper::new(TimeDelta::hours(1), 1)
            .group(&with_exception, &[Dimension::ExceptionType, Dimension::Location])
            .groups
            .into_iter()
            .filter(|g| g.count > self.threshold)
            .take(self.max_patterns)
            .filter_map(|g| {
                let mut key = g.key.into_iter();
                Some(RepeatingPattern {
                    exception_type: key.next()?,
                    location: key.next()?,
                    count: g.count,
                })
            })
            .collect()
    }
}
