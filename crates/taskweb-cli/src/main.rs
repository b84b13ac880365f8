//! # taskweb
//!
//! Command-line front end: loads settings, opens the database, runs one
//! command and prints its result as JSON on stdout. Logs go to stderr.

#![deny(unsafe_code)]

mod commands;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use taskweb_settings::{DatabaseSettings, TaskwebSettings};
use taskweb_tasks::connection::{ConnectionConfig, new_file, verify_pragmas};
use taskweb_tasks::migrations::run_migrations;
use taskweb_tasks::{SystemClock, TaskService};
use tracing::debug;

use crate::commands::Command;

/// Manage tasks and the dependencies between them.
#[derive(Parser, Debug)]
#[command(name = "taskweb", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.taskweb/settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = load_settings(&args)?;
    logging::init_subscriber(&settings.logging.level);

    let service = open_service(&settings)?;
    let output = commands::run(&service, args.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_settings(args: &Cli) -> Result<TaskwebSettings> {
    let mut settings = match args.config {
        Some(ref path) => taskweb_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => taskweb_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                taskweb_settings::settings_path().display()
            )
        })?,
    };
    if let Some(ref db_path) = args.db_path {
        settings.database.path.clone_from(db_path);
    }
    Ok(settings)
}

fn open_service(settings: &TaskwebSettings) -> Result<TaskService> {
    let db_path = &settings.database.path;
    ensure_parent_dir(db_path)?;
    let pool = new_file(db_path, &connection_config(&settings.database))
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let pragmas = {
        let conn = pool.get().context("Failed to get DB connection")?;
        run_migrations(&conn).context("Failed to run task migrations")?;
        verify_pragmas(&conn).context("Failed to read connection pragmas")?
    };
    ensure!(
        pragmas.foreign_keys_enabled,
        "Foreign keys are disabled on {}",
        db_path.display()
    );
    debug!(
        path = %db_path.display(),
        journal_mode = %pragmas.journal_mode,
        "database ready"
    );

    Ok(TaskService::new(pool, Arc::new(SystemClock))
        .with_cycle_rejection(settings.dependencies.reject_cycles))
}

fn connection_config(db: &DatabaseSettings) -> ConnectionConfig {
    ConnectionConfig {
        pool_size: db.pool_size,
        busy_timeout_ms: db.busy_timeout_ms,
        cache_size_kib: db.cache_size_kib,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
