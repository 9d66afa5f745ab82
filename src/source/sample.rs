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

//! Named sample datasets.
//!
//! The analyzer never looks these up on its own; callers pass a
//! [`SampleDataProvider`] in explicitly.

use super::{fetch_once, FetchQuery, FetchedLogs, FileLogSource};
use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDataset {
    pub name: String,
    /// Log file or ZIP archive
    pub path: PathBuf,
    /// Human readable period the logs cover
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Something that can list and load named datasets.
pub trait SampleDataProvider: Send + Sync {
    fn datasets(&self) -> Vec<SampleDataset>;

    fn load(&self, name: &str) -> AnalysisResult<FetchedLogs>;
}

/// Datasets backed by files on disk, usually taken from the config file.
#[derive(Debug, Clone, Default)]
pub struct SampleCatalog {
    datasets: Vec<SampleDataset>,
}

impl SampleCatalog {
    pub const fn new(datasets: Vec<SampleDataset>) -> Self {
        Self { datasets }
    }

    pub fn find(&self, name: &str) -> Option<&SampleDataset> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

impl SampleDataProvider for SampleCatalog {
    fn datasets(&self) -> Vec<SampleDataset> {
        self.datasets.clone()
    }

    fn load(&self, name: &str) -> AnalysisResult<FetchedLogs> {
        let dataset = self
            .find(name)
            .ok_or_else(|| AnalysisError::UnknownDataset(name.to_string()))?;
        tracing::info!(
            "Loading sample '{}' from {}",
            dataset.name,
            dataset.path.display()
        );
        let mut source = FileLogSource::new(dataset.path.clone());
        Ok(fetch_once(&mut source, &FetchQuery::default())?)
    }
}
