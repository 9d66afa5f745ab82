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

//! Stack-trace aware error analysis for application server logs.
//!
//! The pipeline is:
//!
//! ```text
//! raw text -> RecordParser -> [LogEntry] -> EntryFilter
//!          -> TimeSeries -> BurstDetector
//!          -> HotspotGrouper / repeating patterns
//!          -> AnalysisReport
//! ```
//!
//! Everything under [`parser`], [`core`] and [`anomaly`] is pure and works on
//! in-memory batches. [`source`] and [`export`] are the I/O shims around it.

pub mod anomaly;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod parser;
pub mod source;

pub use crate::config::AnalysisConfig;
pub use crate::core::analyzer::{analyze, ErrorAnalyzer};
pub use crate::core::report::{AnalysisReport, Summary};
pub use crate::error::AnalysisError;
pub use crate::parser::entry::{LogEntry, LogLevel, SourceLocation};
pub use crate::parser::{ParseOutcome, ParseStats, RecordParser};
