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

//! Where log data comes from.
//!
//! A [`LogSource`] hands back either raw text per logical file, which the
//! analyzer parses itself, or entries that the backend already structured.
//! Which backend is used is decided by a [`SourceConfig`] value.

pub mod elastic;
pub mod file;
pub mod sample;

use crate::parser::entry::LogEntry;
use crate::parser::exception::ExceptionExtractor;
use crate::parser::SourceText;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use elastic::ElasticsearchSource;
pub use file::FileLogSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source is not connected")]
    NotConnected,

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// What a source returned for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedLogs {
    /// Raw text, one item per logical file
    Text(Vec<SourceText>),
    /// Entries the backend already structured
    Entries(Vec<LogEntry>),
}

impl FetchedLogs {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(sources) => sources.is_empty(),
            Self::Entries(entries) => entries.is_empty(),
        }
    }
}

/// Narrowing hints for a fetch.
///
/// Backends that can filter server-side use these. Text backends return
/// everything and leave filtering to the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchQuery {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Field name to required value
    pub filters: IndexMap<String, String>,
}

/// A backend that can deliver log data.
pub trait LogSource: Send {
    /// Short label for log output
    fn name(&self) -> String;

    fn connect(&mut self) -> SourceResult<()>;

    fn fetch_logs(&self, query: &FetchQuery) -> SourceResult<FetchedLogs>;

    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A plain log file or a ZIP archive of `.log` files
    File { path: PathBuf },
    Elasticsearch {
        url: String,
        index: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl SourceConfig {
    /// Build the backend this config names. The result is not connected yet.
    ///
    /// `extractor` is used by backends that return structured entries.
    pub fn open(&self, extractor: &ExceptionExtractor) -> Box<dyn LogSource> {
        match self {
            Self::File { path } => Box::new(FileLogSource::new(path.clone())),
            Self::Elasticsearch {
                url,
                index,
                username,
                password,
            } => {
                let mut source = ElasticsearchSource::new(url.clone(), index.clone())
                    .with_extractor(extractor.clone());
                if let Some(username) = username {
                    source = source.with_credentials(username.clone(), password.clone());
                }
                Box::new(source)
            }
        }
    }
}

/// Connect, fetch once and close.
pub fn fetch_once(source: &mut dyn LogSource, query: &FetchQuery) -> SourceResult<FetchedLogs> {
    source.connect()?;
    let fetched = source.fetch_logs(query);
    source.close();
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_from_json() {
        let config: SourceConfig =
            serde_json::from_str(r#"{ "kind": "file", "path": "logs/app.zip" }"#)
                .expect("valid source json");
        assert_eq!(
            config,
            SourceConfig::File {
                path: PathBuf::from("logs/app.zip")
            }
        );

        let config: SourceConfig = serde_json::from_str(
            r#"{ "kind": "elasticsearch", "url": "http://localhost:9200", "index": "logs-*" }"#,
        )
        .expect("valid source json");
        assert!(matches!(
            config,
            SourceConfig::Elasticsearch { username: None, .. }
        ));
    }

    #[test]
    fn test_open_selects_backend() {
        let extractor = ExceptionExtractor::default();
        let file = SourceConfig::File {
            path: PathBuf::from("catalina.log"),
        }
        .open(&extractor);
        assert_eq!(file.name(), "file:catalina.log");

        let elastic = SourceConfig::Elasticsearch {
            url: "http://localhost:9200/".to_string(),
            index: "logs-*".to_string(),
            username: None,
            password: None,
        }
        .open(&extractor);
        assert_eq!(elastic.name(), "elasticsearch:http://localhost:9200/logs-*");
    }

    #[test]
    fn test_fetch_once_propagates_connect_errors() {
        let mut source = FileLogSource::new(PathBuf::from("/nonexistent/tracecrab.log"));
        let err = fetch_once(&mut source, &FetchQuery::default()).expect_err("missing file");
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
