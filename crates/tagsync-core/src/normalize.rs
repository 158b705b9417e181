//! Reduce a raw export filename to its canonical base name.
//!
//! Patterns run in a fixed order: export prefix, `[<n> bpm]`, musical key
//! (`[C Major]`, `[F#/Gb min]`), then any other `[...]` group. Each bracket
//! pattern also eats the whitespace in front of it.

use anyhow::{Context, Result};
use regex::Regex;

const BPM_PATTERN: &str = r"\s*\[\d+ bpm\]";
const KEY_PATTERN: &str = r"\s*\[[A-G][#b]?(?:/[A-G][#b]?)?\s*(?i:major|minor|maj|min)\]";
const ANY_TAG_PATTERN: &str = r"\s*\[[^\]]+\]";

/// Canonical base name plus the original extension (with its dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub base: String,
    pub extension: String,
}

/// Compiled normalization patterns for one export prefix.
#[derive(Debug, Clone)]
pub struct Normalizer {
    prefix: Option<Regex>,
    bpm: Regex,
    key: Regex,
    any_tag: Regex,
}

impl Normalizer {
    /// `prefix` is matched literally, case-insensitively, at the start of the name.
    /// An empty prefix disables prefix stripping.
    pub fn new(prefix: &str) -> Result<Self> {
        let prefix = if prefix.is_empty() {
            None
        } else {
            let pattern = format!("(?i)^{}", regex::escape(prefix));
            Some(Regex::new(&pattern).context("compile prefix pattern")?)
        };
        Ok(Self {
            prefix,
            bpm: Regex::new(BPM_PATTERN).context("compile bpm pattern")?,
            key: Regex::new(KEY_PATTERN).context("compile key pattern")?,
            any_tag: Regex::new(ANY_TAG_PATTERN).context("compile tag pattern")?,
        })
    }

    /// Strip prefix and bracketed annotations, then split off the extension.
    pub fn normalize(&self, filename: &str) -> NormalizedName {
        let mut clean = match &self.prefix {
            Some(re) => re.replace(filename, "").into_owned(),
            None => filename.to_string(),
        };
        for re in [&self.bpm, &self.key, &self.any_tag] {
            clean = re.replace_all(&clean, "").into_owned();
        }
        let (base, extension) = split_extension(&clean);
        NormalizedName {
            base: base.trim().to_string(),
            extension: extension.to_string(),
        }
    }
}

/// Split at the last dot, unless that dot starts the name (`.hidden` has no extension).
pub fn split_extension(name: &str) -> (&str, &str) {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(i) => name.split_at(stem_start + i),
        None => (name, ""),
    }
}
