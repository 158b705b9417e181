//! `tagsync upload <dir>` – authenticate and upload tagged audio files.

use anyhow::{Context, Result};
use tagsync_core::auth::{self, Credentials, Endpoints};
use tagsync_core::config::TagsyncConfig;
use tagsync_core::http::Session;
use tagsync_core::session_store::SessionStore;
use tagsync_core::upload::{UploadSummary, Uploader};

use crate::cli::UploadArgs;

fn session_store(cfg: &TagsyncConfig) -> Result<SessionStore> {
    let path = match &cfg.session_file {
        Some(p) => p.clone(),
        None => SessionStore::default_path()?,
    };
    Ok(SessionStore::new(path))
}

/// Restore the saved jar into `session`; problems only cost us the saved session.
fn load_saved_session(store: &SessionStore, session: &mut Session, marker: &str) -> bool {
    println!("Loading saved session...");
    match store.restore_into(session) {
        Ok(true) => match session.session_token(marker) {
            Ok(Some(_)) => {
                println!("Loaded session token from saved session");
                true
            }
            Ok(None) => {
                println!("Saved session has no session token");
                false
            }
            Err(e) => {
                tracing::warn!("inspect restored cookies: {}", e);
                false
            }
        },
        Ok(false) => {
            println!("No saved session found at {}", store.path().display());
            false
        }
        Err(e) => {
            tracing::warn!("Error loading session: {:#}", e);
            println!("Error loading session: {:#}", e);
            false
        }
    }
}

fn upload_blocking(cfg: &TagsyncConfig, args: &UploadArgs) -> Result<UploadSummary> {
    if !args.directory.is_dir() {
        anyhow::bail!("Directory '{}' not found.", args.directory.display());
    }
    let api_url = args.api_url.as_deref().unwrap_or(&cfg.api_url);
    let endpoints = Endpoints::new(api_url)?;
    let marker = cfg.session_cookie_marker.as_str();
    let store = session_store(cfg)?;
    let mut session = Session::new(&cfg.http).context("create HTTP session")?;

    let loaded = args.load_session && load_saved_session(&store, &mut session, marker);
    if !loaded {
        if let Some(token) = &args.session_token {
            auth::install_token(&mut session, &endpoints, marker, token)?;
        } else if let (Some(email), Some(password)) = (&args.email, &args.password) {
            println!("Logging in as {}...", email);
            let credentials = Credentials {
                email: email.clone(),
                password: password.clone(),
            };
            auth::authenticate(&mut session, &endpoints, &credentials, marker)
                .context("Cannot proceed with uploads")?;
            println!("Authentication successful");
        } else {
            anyhow::bail!(
                "You must provide either a session token, email/password, or load a saved session."
            );
        }
    }

    if args.save_session {
        println!("Saving session for future use...");
        match store.save(&mut session) {
            Ok(()) => println!("Session saved to {}", store.path().display()),
            Err(e) => {
                tracing::warn!("Error saving session: {:#}", e);
                println!("Error saving session: {:#}", e);
            }
        }
    }

    let uploader = Uploader::new(endpoints.upload.clone())?;
    let summary = uploader.upload_directory(&mut session, &args.directory, |done, total, record| {
        let name = record
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &record.outcome {
            Ok(_) => println!("  [{}/{}] uploaded {}", done, total, name),
            Err(e) => println!("  [{}/{}] FAILED {}: {}", done, total, name, e),
        }
    });
    Ok(summary)
}

pub async fn run_upload(cfg: &TagsyncConfig, args: UploadArgs) -> Result<()> {
    let cfg = cfg.clone();
    let summary = tokio::task::spawn_blocking(move || upload_blocking(&cfg, &args))
        .await
        .context("upload task join")??;

    let (ok, failed) = summary.counts();
    println!("\nUpload summary:");
    println!("- Successfully uploaded: {} files", ok);
    println!("- Failed: {} files", failed);
    Ok(())
}
