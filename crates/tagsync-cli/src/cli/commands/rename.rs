//! `tagsync rename <dir>` – write tagged copies of audio files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tagsync_core::config::TagsyncConfig;
use tagsync_core::normalize::Normalizer;
use tagsync_core::rename::{RenameSummary, Renamer};
use tagsync_core::tag_index::{TagIndex, DEFAULT_INDEX_FILE};

/// `<input>_processed`, next to the input directory.
pub(crate) fn default_output_dir(input: &Path) -> PathBuf {
    let mut s = input.components().as_path().as_os_str().to_owned();
    s.push("_processed");
    PathBuf::from(s)
}

fn rename_blocking(
    prefix: &str,
    input: &Path,
    output: &Path,
    tags_file: &Path,
) -> Result<RenameSummary> {
    let index = TagIndex::load(tags_file)?;
    if index.is_empty() {
        anyhow::bail!(
            "Failed to load name-tags mapping: {} has no entries",
            tags_file.display()
        );
    }
    let normalizer = Normalizer::new(prefix)?;
    Renamer::new(&normalizer, &index).rename_directory(input, output)
}

pub async fn run_rename(
    cfg: &TagsyncConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    tags_file: Option<PathBuf>,
) -> Result<()> {
    let output = output.unwrap_or_else(|| default_output_dir(&input));
    let tags_file = tags_file
        .or_else(|| cfg.tags_file.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_FILE));

    if !input.is_dir() {
        anyhow::bail!("Input directory '{}' not found.", input.display());
    }
    if !tags_file.exists() {
        anyhow::bail!("Tags file '{}' not found.", tags_file.display());
    }

    println!(
        "Processing files from {} to {}",
        input.display(),
        output.display()
    );
    let prefix = cfg.filename_prefix.clone();
    let summary = tokio::task::spawn_blocking({
        let output = output.clone();
        move || rename_blocking(&prefix, &input, &output, &tags_file)
    })
    .await
    .context("rename task join")??;

    println!(
        "\nProcessed {} files. Encountered {} errors.",
        summary.processed, summary.errors
    );
    Ok(())
}
