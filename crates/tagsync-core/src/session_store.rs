//! Persist the session cookie jar between runs (JSON under the XDG state dir).
//!
//! A missing, unreadable or corrupt store is reported as "no saved session";
//! the caller falls back to explicit credentials.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::http::{Cookie, HttpError, Session};

const STORE_VERSION: u32 = 1;

/// On-disk form of a session: the whole jar, not just the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub version: u32,
    pub cookies: Vec<Cookie>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store path: `~/.local/state/tagsync/session.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tagsync")?;
        Ok(xdg_dirs.get_state_home().join("tagsync").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the session's full cookie jar (temp file + rename, mode 0600 on Unix).
    pub fn save(&self, session: &mut Session) -> Result<()> {
        let stored = StoredSession {
            version: STORE_VERSION,
            cookies: session.cookies().context("read session cookies")?,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&stored).context("serialize session")?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options
                .open(&tmp)
                .with_context(|| format!("open {}", tmp.display()))?;
            file.write_all(&json)
                .with_context(|| format!("write {}", tmp.display()))?;
        }
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} to {}", tmp.display(), self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            cookies = stored.cookies.len(),
            "session saved"
        );
        Ok(())
    }

    /// Read the stored jar. Never fails: problems are logged and yield `None`.
    pub fn load(&self) -> Option<StoredSession> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Error loading session {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) if stored.version == STORE_VERSION => Some(stored),
            Ok(stored) => {
                tracing::warn!(
                    "ignoring session file {} with unknown version {}",
                    self.path.display(),
                    stored.version
                );
                None
            }
            Err(e) => {
                tracing::warn!("Error loading session {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Load into `session`'s jar. Returns false when there was nothing usable to restore.
    /// Cookies the jar refuses are skipped with a warning.
    pub fn restore_into(&self, session: &mut Session) -> Result<bool> {
        let Some(stored) = self.load() else {
            return Ok(false);
        };
        let mut restored = 0;
        for cookie in &stored.cookies {
            match session.add_cookie(cookie) {
                Ok(()) => restored += 1,
                Err(e @ HttpError::CookieRejected { .. }) => {
                    tracing::warn!("skipping saved cookie: {}", e);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("restore cookie {}", cookie.name));
                }
            }
        }
        if restored < stored.cookies.len() {
            tracing::warn!(
                restored,
                saved = stored.cookies.len(),
                "session partially restored"
            );
        } else {
            tracing::debug!(cookies = restored, "session restored");
        }
        Ok(restored > 0 || stored.cookies.is_empty())
    }
}
