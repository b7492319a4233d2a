//! CLI for the MDL media downloader.

mod commands;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdl_core::backend::HttpBackend;
use mdl_core::config::{self, MdlConfig};
use mdl_core::model::MediaFormat;

use commands::{run_get, run_info, run_link, run_status};

/// Top-level CLI for the MDL media downloader.
#[derive(Debug, Parser)]
#[command(name = "mdl")]
#[command(about = "MDL: fetch YouTube, Instagram and Facebook media through a download service", long_about = None)]
pub struct Cli {
    /// Base URL of the download service (overrides `server_url` in config.toml).
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show title, author and duration for a media URL.
    Info {
        /// YouTube, Instagram or Facebook URL.
        url: String,
    },

    /// Download a media URL and print the link to the finished file.
    Get {
        /// YouTube, Instagram or Facebook URL.
        url: String,
        /// Output format: video or audio (default from config).
        #[arg(long, value_name = "FORMAT")]
        format: Option<MediaFormat>,
        /// Quality label for YouTube video, e.g. highest, 720p (default from config).
        #[arg(long, value_name = "QUALITY")]
        quality: Option<String>,
    },

    /// Poll the status of a server-side download job once.
    Status {
        /// Job identifier returned when the download was started.
        id: String,
    },

    /// Print the download link of a finished job.
    Link {
        /// Job identifier returned when the download was started.
        id: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        apply_overrides(&mut cfg, cli.server.as_deref());
        tracing::debug!("loaded config: {:?}", cfg);
        let backend = HttpBackend::new(&cfg)
            .with_context(|| format!("invalid server URL {}", cfg.server_url))?;

        match cli.command {
            CliCommand::Info { url } => run_info(backend, &cfg, &url).await?,
            CliCommand::Get {
                url,
                format,
                quality,
            } => run_get(backend, &cfg, &url, format, quality).await?,
            CliCommand::Status { id } => run_status(&backend, &id).await?,
            CliCommand::Link { id } => run_link(&backend, &id).await?,
        }

        Ok(())
    }
}

/// Command-line flags win over config.toml.
fn apply_overrides(cfg: &mut MdlConfig, server: Option<&str>) {
    if let Some(server) = server {
        cfg.server_url = server.to_string();
    }
}

#[cfg(test)]
mod tests;
