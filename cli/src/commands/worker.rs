//! Long-running worker: queue runtime plus retention sweeper.

use std::sync::Arc;

use anyhow::Result;
use colored::*;

use formshift_pg::{
    MigrationEngine, PgBackupStore, PgFieldCatalog, QueueRuntime, RetentionSweeper,
};

use crate::App;

pub async fn run(app: App) -> Result<()> {
    println!(
        "{} {} worker(s), sweeping every {}h",
        "Starting formshift worker:".cyan().bold(),
        app.config.workers.to_string().yellow(),
        app.config.sweep_interval_hours
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let engine = MigrationEngine::new(app.pool.clone(), app.config.engine_config());
    let runtime = Arc::new(QueueRuntime::new(
        app.jobs.clone(),
        engine,
        Arc::new(PgFieldCatalog::new(app.pool.clone())),
        app.config.runtime_config(),
    ));
    let sweeper = RetentionSweeper::new(
        PgBackupStore::new(app.pool.clone()),
        app.config.sweeper_config(),
    );

    let queue_handle = tokio::spawn(runtime.run(shutdown_rx.clone()));
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    println!();
    println!(
        "{}",
        "Shutting down: in-flight migrations will finish first...".yellow()
    );
    shutdown_tx.send(true)?;

    queue_handle.await?;
    sweeper_handle.await?;
    println!("{}", "✓ Worker stopped".green().bold());
    Ok(())
}
