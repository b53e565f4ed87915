//! `worker` subcommands.

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::WorkerCommand;
use crate::error::Result;
use crate::storage::config::ResolvedConfig;
use crate::storage::db::META_ACTIVE_STORE;
use crate::storage::{PendingSummary, WorkerDb};
use crate::worker::{HttpFetcher, OfflineWorker, WorkerConfig};

/// Open the worker described by the resolved config.
///
/// # Errors
/// Returns an error if the origin is invalid or the database cannot be opened.
pub fn open_worker(config: &ResolvedConfig) -> Result<OfflineWorker<HttpFetcher>> {
    let worker_config = WorkerConfig::from_settings(&config.config.worker, &config.config.edge.origin)?;
    let db = WorkerDb::open(&config.database)?;
    let fetcher = HttpFetcher::with_timeout(config.timeout())?;
    Ok(OfflineWorker::new(worker_config, db, fetcher))
}

/// Snapshot printed by `worker status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub version: String,
    pub current_store: String,
    pub active_store: Option<String>,
    pub stores: Vec<StoreStatus>,
    pub pending: Vec<PendingSummary>,
    pub sync_tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub name: String,
    pub entries: usize,
}

/// Collect the status snapshot.
///
/// # Errors
/// Returns an error if the database cannot be read.
pub fn collect_status(worker: &OfflineWorker<HttpFetcher>) -> Result<WorkerStatus> {
    let storage = worker.storage();
    let stores = storage
        .store_names()?
        .into_iter()
        .map(|name| {
            let entries = storage.entry_count(&name)?;
            Ok(StoreStatus { name, entries })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WorkerStatus {
        version: worker.config().version().to_string(),
        current_store: worker.config().store_name(),
        active_store: storage.db().get_meta(META_ACTIVE_STORE)?,
        stores,
        pending: worker.queue().list()?.iter().map(PendingSummary::from).collect(),
        sync_tags: worker.sync_registry().tags()?,
    })
}

/// Execute a worker subcommand.
///
/// # Errors
/// Returns the lifecycle, sync or storage error.
pub async fn execute(command: &WorkerCommand, config: &ResolvedConfig, no_color: bool) -> Result<()> {
    if no_color {
        colored::control::set_override(false);
    }
    let worker = open_worker(config)?;

    match command {
        WorkerCommand::Install(_) => {
            let report = worker.install().await?;
            println!(
                "{} {} ({} entries)",
                "Installed".green().bold(),
                report.store,
                report.entries
            );
        }
        WorkerCommand::Activate(_) => {
            let report = worker.activate()?;
            println!("{} {}", "Activated".green().bold(), report.store);
            for name in &report.deleted {
                println!("  {} {name}", "deleted".yellow());
            }
        }
        WorkerCommand::Sync(args) => {
            let tag = args
                .tag
                .clone()
                .unwrap_or_else(|| worker.config().sync_tag().to_string());
            match worker.sync(&tag).await? {
                Some(report) => {
                    let label = if report.remaining == 0 {
                        "Synced".green().bold()
                    } else {
                        "Partially synced".yellow().bold()
                    };
                    println!(
                        "{label} {}/{} delivered, {} remaining",
                        report.delivered, report.attempted, report.remaining
                    );
                }
                None => println!("{} unknown sync tag '{tag}'", "Ignored".dimmed()),
            }
        }
        WorkerCommand::Status(args) => {
            let status = collect_status(&worker)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }
    Ok(())
}

fn print_status(status: &WorkerStatus) {
    println!("{} {}", "Version:".bold(), status.version);
    let active = status.active_store.as_deref().unwrap_or("none");
    let active = if active == status.current_store {
        active.green()
    } else {
        active.yellow()
    };
    println!("{} {}", "Active store:".bold(), active);

    println!("{}", "Stores:".bold());
    if status.stores.is_empty() {
        println!("  (none)");
    }
    for store in &status.stores {
        println!("  {:<24} {:>6} entries", store.name, store.entries);
    }

    println!("{} {}", "Pending submissions:".bold(), status.pending.len());
    for pending in &status.pending {
        let error = pending.last_error.as_deref().unwrap_or("-");
        println!(
            "  #{:<4} {} {} (attempts {}, last error: {error})",
            pending.id, pending.method, pending.url, pending.attempts
        );
    }

    if !status.sync_tags.is_empty() {
        println!("{} {}", "Sync tags:".bold(), status.sync_tags.join(", "));
    }
}
