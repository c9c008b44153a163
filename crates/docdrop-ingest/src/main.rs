//! Docdrop - document ingestion tool

use anyhow::{bail, Context, Result};
use clap::Parser;
use docdrop_common::logging::{init_logging, LogConfig, LogLevel};
use docdrop_common::Fingerprint;
use docdrop_ingest::cli::{Cli, Commands, LedgerCommand};
use docdrop_ingest::{CommandPipeline, IngestConfig, IngestionCoordinator, Ledger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use walkdir::WalkDir;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("docdrop")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;
    if let Some(ledger) = cli.ledger {
        config.ledger_path = ledger;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    config.validate()?;

    match cli.command {
        Commands::Submit { paths } => ingest(&config, paths).await,
        Commands::Scan { dir, recursive } => {
            let paths = collect_files(&dir, recursive)?;
            info!(dir = %dir.display(), files = paths.len(), "Scanned directory");
            ingest(&config, paths).await
        },
        Commands::Ledger { action } => ledger_command(&config, action),
    }
}

/// Submit every path, then drain the pool unless interrupted
async fn ingest(config: &IngestConfig, paths: Vec<PathBuf>) -> Result<()> {
    let pipeline = Arc::new(CommandPipeline::from_config(config)?);
    let coordinator = IngestionCoordinator::new(config, pipeline)?;

    for path in &paths {
        coordinator.submit(path).await;
    }

    tokio::select! {
        _ = coordinator.shutdown() => {},
        _ = shutdown_signal() => {
            warn!(
                pending = coordinator.pending(),
                "Interrupted; unfinished files are left in place"
            );
        },
    }

    let stats = coordinator.stats().await;
    info!("{stats}");

    if stats.left_in_place() > 0 {
        bail!(
            "{} file(s) could not be processed and recorded; they were left in place",
            stats.left_in_place()
        );
    }

    Ok(())
}

fn collect_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn ledger_command(config: &IngestConfig, action: LedgerCommand) -> Result<()> {
    let ledger = Ledger::open(&config.ledger_path)?;

    match action {
        LedgerCommand::List { limit, json } => {
            let records = ledger.list(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No processed documents in {}", ledger.path().display());
            } else {
                for record in &records {
                    println!("{record}");
                }
            }
        },
        LedgerCommand::Check { path } => {
            let fingerprint = Fingerprint::from_file(&path)
                .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
            match ledger.get(&fingerprint)? {
                Some(record) => println!(
                    "{}: already processed as '{}' at {}",
                    path.display(),
                    record.filename,
                    record.processed_at.to_rfc3339()
                ),
                None => println!("{}: not processed ({fingerprint})", path.display()),
            }
        },
        LedgerCommand::Count => {
            println!("{}", ledger.count()?);
        },
    }

    Ok(())
}

/// Completes on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
