//! `tagsync extract <input>` – reshape a raw tag export into an index file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tagsync_core::tag_export;
use tagsync_core::tag_index::DEFAULT_INDEX_FILE;

pub async fn run_extract(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| input.with_file_name(DEFAULT_INDEX_FILE));
    println!("Reading from {}...", input.display());
    let count = tokio::task::spawn_blocking({
        let input = input.clone();
        let output = output.clone();
        move || tag_export::convert_export(&input, &output)
    })
    .await
    .context("extract task join")??;
    println!("Successfully extracted data for {} entries.", count);
    println!("Output saved to {}", output.display());
    Ok(())
}
