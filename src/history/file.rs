//! Newline-delimited history file: one canonical URL per processed target.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::HistoryStore;
use crate::extract::parse_url;

/// History backed by an append-only text file.
///
/// Lines written by older versions may hold any recognised link shape
/// (`/opus/…`, `/dynamic/…`); they are normalised to canonical URLs on load.
/// Unrecognised lines are kept verbatim so nothing in the file is lost.
pub struct FileHistory {
    path: PathBuf,
    urls: HashSet<String>,
}

impl FileHistory {
    /// Load the file at `path`. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut urls = HashSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line
                        .with_context(|| format!("failed to read history file {}", path.display()))?;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_url(line) {
                        Some(target) => urls.insert(target.canonical_url),
                        None => urls.insert(line.to_string()),
                    };
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to open history file {}", path.display()));
            }
        }

        tracing::debug!(path = %path.display(), entries = urls.len(), "history loaded");
        Ok(Self { path, urls })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistory {
    fn contains(&self, canonical_url: &str) -> bool {
        self.urls.contains(canonical_url)
    }

    fn add(&mut self, canonical_url: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open history file {}", self.path.display()))?;
        writeln!(file, "{canonical_url}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()?;

        self.urls.insert(canonical_url.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.urls.len()
    }
}
