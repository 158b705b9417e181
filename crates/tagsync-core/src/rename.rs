//! Batch renamer: normalize each audio file name, resolve its tags and write a
//! tagged copy into the destination directory.
//!
//! Copies land under a `.part` name first and are renamed into place, so a
//! failed copy never leaves a half-written output.

use anyhow::{Context, Result};
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use crate::matcher::{self, TagMatch};
use crate::normalize::Normalizer;
use crate::tag_index::TagIndex;

/// Extensions the renamer picks up (compared case-insensitively).
pub const RENAME_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".m4a"];

/// Temporary suffix used before the atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Counts for one rename run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameSummary {
    pub processed: usize,
    pub errors: usize,
}

/// True if `[tag]` reads back as `tag` from a filename. Empty tags and tags
/// containing `]` do not.
pub fn tag_round_trips(tag: &str) -> bool {
    !tag.is_empty() && !tag.contains(']')
}

/// `<base> [t1] [t2]<ext>`, or `<base><ext>` with no tags.
pub fn compose_filename(base: &str, tags: &[String], extension: &str) -> String {
    if tags.is_empty() {
        return format!("{}{}", base, extension);
    }
    for tag in tags.iter().filter(|t| !tag_round_trips(t)) {
        tracing::warn!("tag {:?} on '{}' will not be read back from the filename", tag, base);
    }
    let tag_string = tags
        .iter()
        .map(|t| format!("[{}]", t))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}{}", base, tag_string, extension)
}

/// True if `name` ends with one of `extensions` (case-insensitive).
pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Copy bytes, permissions and timestamps of `src` to `dest` via a temp file.
pub fn copy_with_metadata(src: &Path, dest: &Path) -> Result<()> {
    let tmp = temp_path(dest);
    let result = (|| -> Result<()> {
        fs::copy(src, &tmp)
            .with_context(|| format!("copy {} to {}", src.display(), tmp.display()))?;
        let meta = fs::metadata(src).with_context(|| format!("stat {}", src.display()))?;
        let mut times = FileTimes::new();
        if let Ok(accessed) = meta.accessed() {
            times = times.set_accessed(accessed);
        }
        if let Ok(modified) = meta.modified() {
            times = times.set_modified(modified);
        }
        File::options()
            .write(true)
            .open(&tmp)
            .and_then(|f| f.set_times(times))
            .with_context(|| format!("set times on {}", tmp.display()))?;
        fs::rename(&tmp, dest)
            .with_context(|| format!("rename {} to {}", tmp.display(), dest.display()))?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Normalizer + tag index applied across a directory.
#[derive(Debug)]
pub struct Renamer<'a> {
    normalizer: &'a Normalizer,
    index: &'a TagIndex,
}

impl<'a> Renamer<'a> {
    pub fn new(normalizer: &'a Normalizer, index: &'a TagIndex) -> Self {
        Self { normalizer, index }
    }

    /// Output filename for one raw filename.
    pub fn tagged_name(&self, filename: &str) -> String {
        let name = self.normalizer.normalize(filename);
        let found = matcher::resolve(self.index, &name.base);
        match found {
            TagMatch::Exact(_) => {}
            TagMatch::Partial { key, .. } => {
                tracing::info!("Partial match found: '{}' ↔ '{}'", name.base, key);
            }
            TagMatch::Unmatched => {
                tracing::info!("No tags found for: {}", name.base);
            }
        }
        compose_filename(&name.base, found.tags(), &name.extension)
    }

    /// Copy one file into `output_dir` under its tagged name. Returns the new name.
    pub fn rename_file(&self, input_path: &Path, output_dir: &Path) -> Result<String> {
        let filename = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("unusable file name: {}", input_path.display()))?;
        let new_name = self.tagged_name(filename);
        copy_with_metadata(input_path, &output_dir.join(&new_name))?;
        Ok(new_name)
    }

    /// Process every audio file directly inside `input_dir`.
    /// Per-file failures are logged and counted; only directory-level I/O aborts the run.
    pub fn rename_directory(&self, input_dir: &Path, output_dir: &Path) -> Result<RenameSummary> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("create output dir: {}", output_dir.display()))?;
        tracing::info!(
            "Processing files from {} to {}",
            input_dir.display(),
            output_dir.display()
        );

        let mut summary = RenameSummary::default();
        let entries = fs::read_dir(input_dir)
            .with_context(|| format!("read input dir: {}", input_dir.display()))?;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable directory entry: {}", e);
                    summary.errors += 1;
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || !has_extension(&name, RENAME_EXTENSIONS) {
                continue;
            }
            match self.rename_file(&path, output_dir) {
                Ok(new_name) => {
                    tracing::info!("Processed: {} → {}", name, new_name);
                    summary.processed += 1;
                }
                Err(e) => {
                    tracing::warn!("Error processing {}: {:#}", name, e);
                    summary.errors += 1;
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            "rename run finished"
        );
        Ok(summary)
    }
}
