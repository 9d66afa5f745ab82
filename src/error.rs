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

use thiserror::Error;

use crate::source::SourceError;

/// Hard failures of an analysis run.
///
/// Parse-level problems never show up here: the parser absorbs and counts them
/// in [`crate::parser::ParseStats`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown sample dataset: {0}")]
    UnknownDataset(String),

    #[error("Log source error: {0}")]
    Source(#[from] SourceError),
}

impl AnalysisError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
