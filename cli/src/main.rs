//! formshift — operator CLI for the dynamic-table migration engine.

mod commands;
mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use formshift_pg::{
    ensure_meta_tables, MigrationEngine, MigrationService, PgFieldCatalog, PgJobStore,
    PgRoleProvider,
};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "formshift", version, about = "Schema migrations for form-backed dynamic tables")]
struct Cli {
    /// Path to formshift.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "FORMSHIFT_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Acting user id; role checks run against this actor
    #[arg(long, env = "FORMSHIFT_ACTOR", global = true)]
    actor: Option<Uuid>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff two field-list JSON files and preview the migrations (dry-run)
    Plan {
        /// Previously persisted field list (JSON)
        old: String,
        /// Newly submitted field list (JSON)
        new: String,
    },
    /// Diff two field-list JSON files and enqueue the migrations
    Enqueue {
        old: String,
        new: String,
    },
    /// Show migration history for a form
    History {
        form_id: Uuid,
        /// Only failed migrations
        #[arg(long, conflicts_with = "succeeded")]
        failed: bool,
        /// Only successful migrations
        #[arg(long)]
        succeeded: bool,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Roll back an eligible migration by record id
    Rollback { record_id: Uuid },
    /// Backup operations
    #[command(subcommand)]
    Backups(commands::backups::BackupsCommand),
    /// Delete backups older than the retention window
    Cleanup {
        #[arg(long, default_value_t = formshift_core::DEFAULT_RETENTION_DAYS)]
        retention_days: i64,
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Queue counts, per form or global
    QueueStatus { form_id: Option<Uuid> },
    /// Run the migration workers and the retention sweeper until ctrl-c
    Worker,
}

/// Shared handles the commands work with.
pub struct App {
    pub service: MigrationService,
    pub jobs: PgJobStore,
    pub config: Config,
    pub pool: sqlx::PgPool,
}

impl App {
    async fn connect(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(url) = &cli.database_url {
            config.database_url = Some(url.clone());
        }
        let url = config
            .database_url
            .clone()
            .context("no database URL; set --database-url or FORMSHIFT_DATABASE_URL")?;

        let pool = formshift_pg::connect(&url, config.pool_size)
            .await
            .context("failed to connect to PostgreSQL")?;
        ensure_meta_tables(&pool).await?;

        let engine = MigrationEngine::new(pool.clone(), config.engine_config());
        let jobs = PgJobStore::new(pool.clone());
        let service = MigrationService::new(
            engine,
            jobs.clone(),
            Arc::new(PgFieldCatalog::new(pool.clone())),
            Arc::new(PgRoleProvider::new(pool.clone())),
        );
        Ok(Self {
            service,
            jobs,
            config,
            pool,
        })
    }
}

fn require_actor(actor: Option<Uuid>) -> Result<Uuid> {
    actor.context("no actor; set --actor or FORMSHIFT_ACTOR")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let app = App::connect(&cli).await?;
    let actor = cli.actor;

    match cli.command {
        Commands::Plan { old, new } => {
            commands::plan::run(&app, require_actor(actor)?, &old, &new).await
        }
        Commands::Enqueue { old, new } => {
            commands::enqueue::run(&app, require_actor(actor)?, &old, &new).await
        }
        Commands::History {
            form_id,
            failed,
            succeeded,
            limit,
            offset,
        } => {
            let success = match (failed, succeeded) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            commands::history::run(&app, require_actor(actor)?, form_id, success, limit, offset)
                .await
        }
        Commands::Rollback { record_id } => {
            commands::rollback::run(&app, require_actor(actor)?, record_id).await
        }
        Commands::Backups(cmd) => commands::backups::run(&app, require_actor(actor)?, cmd).await,
        Commands::Cleanup {
            retention_days,
            dry_run,
        } => commands::cleanup::run(&app, require_actor(actor)?, retention_days, dry_run).await,
        Commands::QueueStatus { form_id } => {
            commands::status::run(&app, require_actor(actor)?, form_id).await
        }
        Commands::Worker => commands::worker::run(app).await,
    }
}
