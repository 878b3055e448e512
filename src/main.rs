// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use artifetch::download::progress::silent_factory;
use artifetch::fetch::download_url_with_agent;
use artifetch::utils::{format_bytes, mask_sensitive};
use artifetch::{
    Aria2Client, Config, DirectFetcher, DownloadRoute, Downloader, FetchError, HubClient,
    QueueClient,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - queue daemon not reachable
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// I/O error - transfer or file operation failed
    pub const IO_ERR: i32 = 74;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// artifetch - fetch model artifacts, directly or through an aria2 queue.
#[derive(Parser)]
#[command(name = "artifetch")]
#[command(version = VERSION)]
#[command(about = "Fetch model artifacts, directly or through an aria2 download queue.")]
#[command(long_about = "artifetch - model artifact fetcher\n\n\
    Download a file:     artifetch get <URL> <MODEL_DIR> <FILENAME>\n\
    Whole hub repo:      artifetch repo <REPO_ID> <LOCAL_DIR>\n\
    Queue tasks:         artifetch tasks\n\n\
    Set ARTIFETCH_QUEUE_URL to hand transfers to aria2.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config dir>/artifetch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Quiet mode: warnings only, no progress bars
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose mode: debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one file into a model directory
    ///
    /// Examples:
    ///   artifetch get https://huggingface.co/org/m/resolve/main/a.bin models/checkpoints a.bin
    Get {
        /// Origin URL
        url: String,
        /// Model directory (absolute, install-root-relative, or relative to models/)
        model_dir: String,
        /// File name to save as
        filename: String,
    },

    /// Download every file of a hub repository
    Repo {
        /// Repository id, e.g. "org/model"
        repo_id: String,
        /// Destination directory
        local_dir: PathBuf,
    },

    /// Download with a browser user agent
    Agent {
        url: String,
        save_path: PathBuf,
    },

    /// List queue daemon tasks
    Tasks,

    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("artifetch={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(err: &FetchError) -> i32 {
    match err {
        FetchError::QueueUnavailable(_) => SERVICE_UNAVAILABLE,
        FetchError::Config(_) | FetchError::AuthConfig(_) => CONFIG,
        FetchError::Io { .. } | FetchError::TransferFailed { .. } | FetchError::DirectFetch { .. } => {
            IO_ERR
        }
        FetchError::InvalidPath(_) => ERROR,
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<FetchError>() {
            Some(fetch_err) => {
                eprintln!("{}", fetch_err.report().red());
                exit_code_for(fetch_err)
            }
            None => {
                eprintln!("{} {:#}", "[✗]".red(), e);
                ERROR
            }
        },
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Get {
            url,
            model_dir,
            filename,
        } => {
            let mut downloader = Downloader::new(&config)?;
            if cli.quiet {
                downloader = downloader
                    .with_fetcher(DirectFetcher::new()?.quiet())
                    .with_progress(silent_factory());
            }

            let outcome = downloader.download_url(&url, &model_dir, &filename)?;
            let how = match &outcome.route {
                DownloadRoute::Delegated { gid, reused: true } => format!("queue task {} (reused)", gid),
                DownloadRoute::Delegated { gid, reused: false } => format!("queue task {}", gid),
                DownloadRoute::Direct => "direct".to_string(),
            };
            println!("{} {} via {}", "[OK]".green(), outcome.path.display(), how);
        }
        Commands::Repo { repo_id, local_dir } => {
            let mut hub = HubClient::from_config(&config)?;
            if cli.quiet {
                hub = hub.quiet();
            }
            let summary = hub.download_repo(&repo_id, &local_dir)?;
            println!(
                "{} {} files, {} into {}",
                "[OK]".green(),
                summary.files,
                format_bytes(summary.bytes),
                local_dir.display()
            );
            if !summary.skipped.is_empty() {
                println!("{} skipped (no size): {}", "[!]".yellow(), summary.skipped.join(", "));
            }
        }
        Commands::Agent { url, save_path } => {
            if !download_url_with_agent(&url, &save_path) {
                return Ok(ERROR);
            }
        }
        Commands::Tasks => {
            let url = config
                .queue_url
                .as_deref()
                .context("no queue daemon configured (set ARTIFETCH_QUEUE_URL)")?;
            let client = Aria2Client::new(url, config.queue_secret.clone())?;
            let tasks = client.list_tasks()?;
            if tasks.is_empty() {
                println!("No tasks in {}", client.endpoint());
            }
            for task in tasks {
                let pct = task
                    .progress_percent()
                    .map(|p| format!("{:5.1}%", p))
                    .unwrap_or_else(|| "    ?".to_string());
                println!(
                    "{}  {:<8}  {}  {}",
                    task.gid.cyan(),
                    task.status.to_string(),
                    pct,
                    task.primary_path().unwrap_or("-")
                );
            }
        }
        Commands::Config => {
            let mut shown = config.clone();
            shown.queue_secret = shown.queue_secret.map(|s| mask_sensitive(&s, 2));
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }

    Ok(SUCCESS)
}
