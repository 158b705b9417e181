//! Name→tags index loaded from the cleaned export (`[{filename, tags}]`).
//!
//! Keys are trimmed and lower-cased. Insertion order is kept because the
//! substring fallback in the matcher takes the first key that fits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Index file name used when none is configured.
pub const DEFAULT_INDEX_FILE: &str = "name_tags.json";

/// One element of the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndexEntry {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("read tags file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse tags file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Order-preserving lookup from canonical name to tags.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    entries: Vec<(String, Vec<String>)>,
    positions: HashMap<String, usize>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and key the index file. Missing, unreadable or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<TagIndexEntry> =
            serde_json::from_slice(&bytes).map_err(|source| IndexError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let index: TagIndex = entries.into_iter().collect();
        tracing::debug!(path = %path.display(), keys = index.len(), "loaded tag index");
        Ok(index)
    }

    /// Insert under the trimmed, lower-cased name. Empty names are ignored.
    /// A repeated key takes the new tags but keeps its original position.
    pub fn insert(&mut self, name: &str, tags: Vec<String>) {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = tags,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, tags));
            }
        }
    }

    /// Exact lookup; `name` is case-folded before comparison.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        let key = name.to_lowercase();
        self.positions
            .get(&key)
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    /// Keys and tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, tags)| (k.as_str(), tags.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<TagIndexEntry> for TagIndex {
    fn from_iter<I: IntoIterator<Item = TagIndexEntry>>(iter: I) -> Self {
        let mut index = TagIndex::new();
        for entry in iter {
            index.insert(&entry.filename, entry.tags);
        }
        index
    }
}
