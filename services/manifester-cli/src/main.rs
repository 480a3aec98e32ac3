//! Manifester
//!
//! Command-line front end for the subscription allocation API:
//! - `get-manifest` creates an allocation for a settings category, attaches
//!   its subscriptions and downloads the manifest
//! - `delete` removes allocations listed in the local inventory
//! - `inventory` prints the local inventory

mod commands;
mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manifester::Manifester;
use requester::HttpRequester;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "manifester", version, about = "Subscription manifest generator")]
struct Cli {
    /// Settings file (default: $MANIFESTER_DIRECTORY/manifester_settings.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an allocation for a manifest category and download its manifest
    GetManifest {
        /// Category table under [manifest_category] in the settings file
        #[arg(long)]
        manifest_category: String,
        /// Allocation name (default: <username_prefix>-<8 random letters>)
        #[arg(long)]
        allocation_name: Option<String>,
    },
    /// Delete allocations from the inventory by index or name
    Delete {
        allocations: Vec<String>,
        /// Delete every allocation in the inventory
        #[arg(long)]
        all: bool,
        /// Also delete the local manifest files
        #[arg(long)]
        remove_manifest_file: bool,
    },
    /// Display the local inventory
    Inventory {
        /// Show every field of each allocation
        #[arg(long)]
        details: bool,
        /// Fetch allocations from the API before displaying
        #[arg(long)]
        sync: bool,
    },
}

/// Daily log files under `log_dir`, keeping the newest three.
fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("manifester")
        .filename_suffix("log")
        .max_log_files(3)
        .build(log_dir)
        .context("failed to open log file")
}

/// Logs go to stderr so command output on stdout stays clean, and to a
/// rolling file under `log_dir`. The returned guard flushes the file writer
/// on drop.
fn init_tracing(default_level: &str, json: bool, log_dir: &Path) -> Result<WorkerGuard> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer),
    );
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(guard)
}

fn build_manifester(settings: &Settings, category: Option<&str>) -> Result<Manifester> {
    let config = settings.manifester_config(category)?;
    let proxy = settings.https_proxy(category);
    let requester = HttpRequester::new(settings.tuning.request_timeout(), proxy.as_deref())
        .context("failed to build HTTP client")?;
    Ok(Manifester::new(config, Arc::new(requester)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = Settings::resolve_path(cli.config.as_deref());
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    let _log_guard = init_tracing(&settings.log_level, cli.log_json, &settings.log_directory)?;
    info!(path = %settings_path.display(), "settings loaded");

    match cli.command {
        Command::GetManifest {
            manifest_category,
            allocation_name,
        } => {
            let spec = settings.manifest_spec(&manifest_category, allocation_name)?;
            let mut manifester = build_manifester(&settings, Some(&manifest_category))?;
            let path = commands::get_manifest(&mut manifester, &spec).await?;
            println!("{path}");
        }
        Command::Delete {
            allocations,
            all,
            remove_manifest_file,
        } => {
            let mut manifester = build_manifester(&settings, None)?;
            let deleted =
                commands::delete(&mut manifester, &allocations, all, remove_manifest_file).await?;
            info!(deleted, "delete finished");
        }
        Command::Inventory { details, sync } => {
            let mut manifester = build_manifester(&settings, None)?;
            let records = commands::inventory(&mut manifester, sync).await?;
            if details {
                print!("{}", commands::render_details(&records));
            } else {
                print!("{}", commands::render_table(&records));
            }
        }
    }

    Ok(())
}
