//! Prompt history, one list per category ("search", "command", ...)
//!
//! Persisted as one plain text file per category, one entry per line. Only
//! entries added during this run are appended on save.

use crate::error::Error;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct HistoryStore {
    data: HashMap<String, Vec<String>>,
    prev: HashMap<String, String>,
    /// Entries per category that were already on disk
    loaded: HashMap<String, usize>,
    dir: Option<PathBuf>,
}

impl HistoryStore {
    /// History that is never written anywhere
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Read every category file from `dir`; a missing directory is empty
    pub fn load(dir: PathBuf) -> Result<Self, Error> {
        let mut store = Self {
            dir: Some(dir.clone()),
            ..Self::default()
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(source) => return Err(Error::History { path: dir, source }),
        };

        for entry in entries {
            let entry = entry.map_err(|source| Error::History {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(category) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path).map_err(|source| Error::History {
                path: path.clone(),
                source,
            })?;
            let lines: Vec<String> = text.lines().map(String::from).collect();
            store.loaded.insert(category.to_string(), lines.len());
            store.data.insert(category.to_string(), lines);
        }
        log::debug!("loaded {} history categories from {}", store.data.len(), dir.display());
        Ok(store)
    }

    pub fn entries(&self, category: &str) -> &[String] {
        self.data.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most recent value submitted for a category
    pub fn previous(&self, category: &str) -> Option<&str> {
        self.prev.get(category).map(String::as_str)
    }

    /// Remember a submitted value; repeats of the last entry are not stored twice
    pub fn record(&mut self, category: &str, value: &str) {
        let entries = self.data.entry(category.to_string()).or_default();
        if entries.last().map(String::as_str) != Some(value) {
            entries.push(value.to_string());
        }
        self.prev.insert(category.to_string(), value.to_string());
    }

    /// Append this run's new entries to the category files
    pub fn save(&self) -> Result<(), Error> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|source| Error::History {
            path: dir.clone(),
            source,
        })?;

        for (category, entries) in &self.data {
            let already = self.loaded.get(category).copied().unwrap_or(0);
            let new = entries.get(already..).unwrap_or(&[]);
            if new.is_empty() {
                continue;
            }
            let path = dir.join(category);
            append_lines(&path, new).map_err(|source| Error::History { path, source })?;
        }
        Ok(())
    }
}

fn append_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
