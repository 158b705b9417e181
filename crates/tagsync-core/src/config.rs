use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default base URL of the remote service.
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Fragment identifying the cookie that carries the session credential.
pub const DEFAULT_SESSION_COOKIE_MARKER: &str = "next-auth.session-token";

/// Export prefix stripped from raw filenames before matching.
pub const DEFAULT_FILENAME_PREFIX: &str = "mateo_19182 - ";

/// Transport timeouts (optional `[http]` section in config.toml).
/// Unset values leave libcurl's defaults in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in seconds.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Global configuration loaded from `~/.config/tagsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsyncConfig {
    /// Base URL of the remote service (overridden by `--api-url`).
    pub api_url: String,
    /// Cookies whose name contains this fragment carry the session credential.
    pub session_cookie_marker: String,
    /// Literal prefix removed (case-insensitively) from the start of raw filenames.
    pub filename_prefix: String,
    /// Default name→tags index used by `rename` when `--tags-file` is not given.
    #[serde(default)]
    pub tags_file: Option<PathBuf>,
    /// Where `--save-session` / `--load-session` keep the cookie jar.
    /// Defaults to `~/.local/state/tagsync/session.json`.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for TagsyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_cookie_marker: DEFAULT_SESSION_COOKIE_MARKER.to_string(),
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            tags_file: None,
            session_file: None,
            http: HttpConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tagsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TagsyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TagsyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(&path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: TagsyncConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TagsyncConfig::default();
        assert_eq!(cfg.api_url, "http://localhost:3001");
        assert_eq!(cfg.session_cookie_marker, "next-auth.session-token");
        assert_eq!(cfg.filename_prefix, "mateo_19182 - ");
        assert!(cfg.tags_file.is_none());
        assert!(cfg.http.connect_timeout().is_none());
        assert!(cfg.http.timeout().is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TagsyncConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TagsyncConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.api_url, cfg.api_url);
        assert_eq!(parsed.session_cookie_marker, cfg.session_cookie_marker);
        assert_eq!(parsed.filename_prefix, cfg.filename_prefix);
        assert_eq!(parsed.http, cfg.http);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            api_url = "https://tracks.example.com"
            session_cookie_marker = "session-token"
            filename_prefix = "producer - "
            tags_file = "/srv/tags.json"

            [http]
            connect_timeout_secs = 5
        "#;
        let cfg: TagsyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.api_url, "https://tracks.example.com");
        assert_eq!(cfg.session_cookie_marker, "session-token");
        assert_eq!(cfg.filename_prefix, "producer - ");
        assert_eq!(cfg.tags_file, Some(PathBuf::from("/srv/tags.json")));
        assert!(cfg.session_file.is_none());
        assert_eq!(cfg.http.connect_timeout(), Some(Duration::from_secs(5)));
        assert!(cfg.http.timeout().is_none());
    }
}
