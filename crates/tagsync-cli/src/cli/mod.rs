//! CLI for tagsync.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tagsync_core::config;

use commands::{run_extract, run_rename, run_upload};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tagsync")]
#[command(about = "tagsync: tag audio exports by name and upload them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Copy audio files with their canonical tags embedded in the filename.
    Rename {
        /// Directory containing the audio files to process.
        input_directory: PathBuf,

        /// Where tagged copies go (default: `<input_directory>_processed`).
        #[arg(long)]
        output_directory: Option<PathBuf>,

        /// JSON name→tags index (default: config `tags_file`, else `name_tags.json`).
        #[arg(long)]
        tags_file: Option<PathBuf>,
    },

    /// Upload audio files, sending the bracketed filename tags as metadata.
    Upload(UploadArgs),

    /// Convert a raw tag export (concatenated JSON arrays) into a name→tags index.
    Extract {
        /// Raw export file.
        input: PathBuf,

        /// Output index file (default: `name_tags.json` next to the input).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// Directory containing the audio files to upload (walked recursively).
    pub directory: PathBuf,

    /// Base URL of the API (default: config `api_url`, http://localhost:3001).
    #[arg(long)]
    pub api_url: Option<String>,

    /// Email for authentication.
    #[arg(long)]
    pub email: Option<String>,

    /// Password for authentication.
    #[arg(long)]
    pub password: Option<String>,

    /// Existing session token to use instead of signing in.
    #[arg(long)]
    pub session_token: Option<String>,

    /// Save the authenticated session for later runs.
    #[arg(long)]
    pub save_session: bool,

    /// Load a previously saved session.
    #[arg(long)]
    pub load_session: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Rename {
                input_directory,
                output_directory,
                tags_file,
            } => run_rename(&cfg, input_directory, output_directory, tags_file).await?,
            CliCommand::Upload(args) => run_upload(&cfg, args).await?,
            CliCommand::Extract { input, output } => run_extract(input, output).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
