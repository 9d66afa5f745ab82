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

//! Elasticsearch backend.
//!
//! Runs a single `_search` with a bool query: the time range goes into
//! `filter` on `@timestamp`, each field filter becomes a `match` clause.
//! Hits are mapped to [`LogEntry`] values directly, so nothing is re-parsed.

use super::{FetchQuery, FetchedLogs, LogSource, SourceError, SourceResult};
use crate::parser::entry::{LogEntry, LogLevel};
use crate::parser::exception::ExceptionExtractor;
use chrono::{DateTime, NaiveDateTime};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_PAGE_SIZE: usize = 10_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const TIMESTAMP_FIELDS: &[&str] = &["@timestamp", "timestamp"];
const LEVEL_FIELDS: &[&str] = &["log.level", "level"];
const THREAD_FIELDS: &[&str] = &["process.thread.name", "thread", "thread_name"];
const LOGGER_FIELDS: &[&str] = &["log.logger", "logger", "logger_name"];
const STACK_FIELDS: &[&str] = &["error.stack_trace", "stack_trace"];

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitList,
}

#[derive(Deserialize)]
struct HitList {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Value,
}

pub struct ElasticsearchSource {
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
    page_size: usize,
    extractor: ExceptionExtractor,
    client: Option<Client>,
}

impl ElasticsearchSource {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_owned(),
            index: index.into(),
            username: None,
            password: None,
            page_size: DEFAULT_PAGE_SIZE,
            extractor: ExceptionExtractor::default(),
            client: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: String, password: Option<String>) -> Self {
        self.username = Some(username);
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: ExceptionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }

    /// The `_search` request body for `query`.
    pub fn build_query(&self, query: &FetchQuery) -> Value {
        let mut filter = Vec::new();
        if query.start.is_some() || query.end.is_some() {
            let mut range = Map::new();
            if let Some(start) = query.start {
                range.insert("gte".to_string(), Value::String(iso(start)));
            }
            if let Some(end) = query.end {
                range.insert("lte".to_string(), Value::String(iso(end)));
            }
            filter.push(json!({ "range": { "@timestamp": range } }));
        }

        let must: Vec<Value> = query
            .filters
            .iter()
            .map(|(field, value)| {
                let mut clause = Map::new();
                clause.insert(field.clone(), Value::String(value.clone()));
                json!({ "match": clause })
            })
            .collect();

        json!({
            "query": { "bool": { "must": must, "filter": filter } },
            "sort": [{ "@timestamp": { "order": "asc" } }],
            "size": self.page_size,
        })
    }

    /// Map one hit's `_source` document to an entry.
    ///
    /// Returns `None` when the document has no usable timestamp.
    pub fn hit_to_entry(&self, doc: &Value, hit_number: usize) -> Option<LogEntry> {
        let timestamp = first_field(doc, TIMESTAMP_FIELDS).and_then(parse_timestamp)?;
        let level = first_str(doc, LEVEL_FIELDS).map_or(LogLevel::Unknown, LogLevel::from_token);
        let thread = first_str(doc, THREAD_FIELDS).unwrap_or_default();
        let logger = first_str(doc, LOGGER_FIELDS).unwrap_or_default();
        let message = field(doc, "message").and_then(Value::as_str).unwrap_or_default();

        let stack_trace = match first_field(doc, STACK_FIELDS) {
            Some(Value::String(trace)) => trace.lines().map(ToString::to_string).collect(),
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect(),
            Some(Value::Null | Value::Bool(_) | Value::Number(_) | Value::Object(_)) | None => {
                Vec::new()
            }
        };

        let entry = LogEntry::new(timestamp, level, thread, logger, message)
            .with_source(self.index.clone(), hit_number)
            .with_stack_trace(stack_trace);
        Some(self.extractor.enrich(entry))
    }

    fn parse_response(&self, body: &str) -> SourceResult<Vec<LogEntry>> {
        let response: SearchResponse =
            serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;

        let total = response.hits.hits.len();
        let entries: Vec<LogEntry> = response
            .hits
            .hits
            .iter()
            .enumerate()
            .filter_map(|(idx, hit)| self.hit_to_entry(&hit.source, idx + 1))
            .collect();
        if entries.len() < total {
            warn!(
                "{}: skipped {} hit(s) without a usable timestamp",
                self.index,
                total - entries.len()
            );
        }
        Ok(entries)
    }
}

impl LogSource for ElasticsearchSource {
    fn name(&self) -> String {
        format!("elasticsearch:{}/{}", self.base_url, self.index)
    }

    fn connect(&mut self) -> SourceResult<()> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        info!("Connecting to Elasticsearch at {}", self.base_url);

        let mut request = client.get(&self.base_url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        request.send()?.error_for_status()?;

        self.client = Some(client);
        Ok(())
    }

    fn fetch_logs(&self, query: &FetchQuery) -> SourceResult<FetchedLogs> {
        let client = self.client.as_ref().ok_or(SourceError::NotConnected)?;
        let body = self.build_query(query);
        debug!("Searching {} with {body}", self.search_url());

        let mut request = client.post(self.search_url()).json(&body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        let text = request.send()?.error_for_status()?.text()?;

        let entries = self.parse_response(&text)?;
        info!("Fetched {} entries from {}", entries.len(), self.index);
        Ok(FetchedLogs::Entries(entries))
    }

    fn close(&mut self) {
        self.client = None;
    }
}

fn iso(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Look up `path` either as a flat key (`"log.level"`) or as nested objects.
fn field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

fn first_field<'a>(doc: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| field(doc, path))
}

fn first_str<'a>(doc: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .find_map(|path| field(doc, path).and_then(Value::as_str))
}

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}
