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

use super::{FetchQuery, FetchedLogs, LogSource, SourceError, SourceResult};
use crate::parser::SourceText;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Reads a single log file or every `.log` member of a ZIP archive.
///
/// Bytes are decoded as lossy UTF-8, so a stray invalid sequence never
/// rejects a whole file.
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
    connected: bool,
}

impl FileLogSource {
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            connected: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_zip(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    }

    fn read_plain(&self) -> SourceResult<Vec<SourceText>> {
        let start = std::time::Instant::now();
        let bytes = std::fs::read(&self.path).map_err(|e| SourceError::io(&self.path, e))?;
        info!(
            "Read {} bytes from {} in {:?}",
            bytes.len(),
            self.path.display(),
            start.elapsed()
        );

        let name = self
            .path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(vec![SourceText::new(
            name,
            String::from_utf8_lossy(&bytes).into_owned(),
        )])
    }

    fn read_zip(&self) -> SourceResult<Vec<SourceText>> {
        let file = File::open(&self.path).map_err(|e| SourceError::io(&self.path, e))?;
        let mut archive = ZipArchive::new(file)?;
        let mut texts = Vec::new();

        for idx in 0..archive.len() {
            let mut member = archive.by_index(idx)?;
            if member.is_dir() || !member.name().ends_with(".log") {
                debug!("Skipping archive member {}", member.name());
                continue;
            }
            let name = member.name().to_string();
            let mut bytes = Vec::new();
            member
                .read_to_end(&mut bytes)
                .map_err(|e| SourceError::io(self.path.join(&name), e))?;
            debug!("Archive member {name}: {} bytes", bytes.len());
            texts.push(SourceText::new(
                name,
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }

        info!(
            "Read {} log file(s) from archive {}",
            texts.len(),
            self.path.display()
        );
        Ok(texts)
    }
}

impl LogSource for FileLogSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn connect(&mut self) -> SourceResult<()> {
        let metadata = std::fs::metadata(&self.path).map_err(|e| SourceError::io(&self.path, e))?;
        debug!("{}: {} bytes", self.path.display(), metadata.len());
        self.connected = true;
        Ok(())
    }

    /// The whole file. Query bounds are applied by the analyzer's filter.
    fn fetch_logs(&self, _query: &FetchQuery) -> SourceResult<FetchedLogs> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        let texts = if self.is_zip() {
            self.read_zip()?
        } else {
            self.read_plain()?
        };
        Ok(FetchedLogs::Text(texts))
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
