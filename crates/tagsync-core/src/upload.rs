//! Upload tagged audio files to the service.
//!
//! Tags are re-read from each filename's `[...]` groups; the file on disk is
//! the source of truth, not the tag index. Failures are recorded per file and
//! never stop the batch.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::http::{FormField, HttpError, Session};
use crate::rename::has_extension;

/// Extensions the uploader picks up (compared case-insensitively).
pub const UPLOAD_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a", ".flac", ".aac"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HTTP {status}: {body}")]
    Status { status: u32, body: String },
    #[error(transparent)]
    Transport(#[from] HttpError),
    #[error("unreadable file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Result of one upload attempt.
#[derive(Debug)]
pub struct UploadRecord {
    pub path: PathBuf,
    pub tags: Vec<String>,
    pub outcome: Result<serde_json::Value, UploadError>,
}

impl UploadRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    pub records: Vec<UploadRecord>,
}

impl UploadSummary {
    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.records.len() - self.success_count()
    }

    /// `(success_count, error_count)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.success_count(), self.error_count())
    }
}

const TAG_PATTERN: &str = r"\[([^\]]+)\]";

/// Content type sent with the file part.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    match lower.rsplit_once('.').map(|(_, ext)| ext) {
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        _ => "audio/mpeg",
    }
}

/// Every file under `dir` (recursive) whose name has an upload extension.
pub fn discover_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!("skipping unreadable path during walk: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(&e.file_name().to_string_lossy(), UPLOAD_EXTENSIONS))
        .map(|e| e.into_path())
        .collect()
}

/// Posts files with their filename tags to the upload endpoint.
#[derive(Debug, Clone)]
pub struct Uploader {
    endpoint: String,
    tag_pattern: Regex,
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            tag_pattern: Regex::new(TAG_PATTERN).context("compile tag pattern")?,
        })
    }

    /// Inner text of every `[...]` group, left to right.
    pub fn extract_tags(&self, filename: &str) -> Vec<String> {
        self.tag_pattern
            .captures_iter(filename)
            .map(|c| c[1].to_string())
            .collect()
    }

    fn send(
        &self,
        session: &mut Session,
        path: &Path,
        filename: &str,
        tags: &[String],
    ) -> Result<serde_json::Value, UploadError> {
        std::fs::File::open(path)?;

        let mut fields = Vec::with_capacity(tags.len() + 1);
        fields.push(FormField::File {
            name: "file",
            path,
            content_type: content_type_for(filename),
        });
        fields.extend(tags.iter().map(|t| FormField::Text {
            name: "tags",
            value: t.as_str(),
        }));

        let response = session.post_multipart(&self.endpoint, &fields)?;
        if response.status != 200 && response.status != 201 {
            return Err(UploadError::Status {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(response.json()?)
    }

    /// Upload one file. Never fails; the outcome is in the record.
    pub fn upload_file(&self, session: &mut Session, path: &Path) -> UploadRecord {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tags = self.extract_tags(&filename);
        tracing::debug!("Uploading {} with tags: {:?}", filename, tags);

        let outcome = self.send(session, path, &filename, &tags);
        match &outcome {
            Ok(_) => tracing::info!("Successfully uploaded {}", filename),
            Err(e) => tracing::warn!("Failed to upload {}: {}", filename, e),
        }
        UploadRecord {
            path: path.to_path_buf(),
            tags,
            outcome,
        }
    }

    /// Upload every discovered file in order. `on_progress(done, total, record)`
    /// is called after each attempt.
    pub fn upload_directory<F>(&self, session: &mut Session, dir: &Path, mut on_progress: F) -> UploadSummary
    where
        F: FnMut(usize, usize, &UploadRecord),
    {
        let files = discover_files(dir);
        tracing::info!("Found {} audio files to upload", files.len());

        let total = files.len();
        let mut summary = UploadSummary {
            records: Vec::with_capacity(total),
        };
        for (i, path) in files.iter().enumerate() {
            let record = self.upload_file(session, path);
            on_progress(i + 1, total, &record);
            summary.records.push(record);
        }

        let (ok, failed) = summary.counts();
        tracing::info!(success = ok, failed, "upload run finished");
        summary
    }
}
