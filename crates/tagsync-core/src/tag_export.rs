//! Reshape the tagging service's raw export into the index file format.
//!
//! The raw export is several JSON arrays written back to back. Only `name`
//! and `tags` are kept from each element.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::tag_index::TagIndexEntry;

/// Fields we care about from one raw export element; everything else is ignored.
#[derive(Debug, Deserialize)]
struct RawExportItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Parse concatenated JSON arrays into index entries, preserving order.
pub fn parse_export(content: &str) -> Result<Vec<TagIndexEntry>> {
    let mut entries = Vec::new();
    let stream = serde_json::Deserializer::from_str(content).into_iter::<Vec<RawExportItem>>();
    for (i, chunk) in stream.enumerate() {
        let chunk = chunk.with_context(|| format!("parse export array #{}", i + 1))?;
        entries.extend(chunk.into_iter().map(|item| TagIndexEntry {
            filename: item.name,
            tags: item.tags,
        }));
    }
    Ok(entries)
}

/// Read a raw export, write the cleaned `[{filename, tags}]` array. Returns the entry count.
pub fn convert_export(input: &Path, output: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("read export: {}", input.display()))?;
    let entries = parse_export(&content)?;
    let json = serde_json::to_string_pretty(&entries).context("serialize index entries")?;
    std::fs::write(output, json).with_context(|| format!("write index: {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        entries = entries.len(),
        "converted tag export"
    );
    Ok(entries.len())
}
