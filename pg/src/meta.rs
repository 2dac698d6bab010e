//! Pool construction and meta-table bootstrap.
//!
//! The engine keeps its own state in three tables alongside the dynamic
//! tables: the append-only audit log, the column backups, and the durable
//! job queue. All three are created idempotently at startup.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Append-only audit log of every attempted schema change.
pub const MIGRATIONS_TABLE: &str = "_formshift_migrations";
/// Column snapshots taken before destructive operations.
pub const BACKUPS_TABLE: &str = "_formshift_backups";
/// Durable per-form migration queue.
pub const JOBS_TABLE: &str = "_formshift_jobs";

const BOOTSTRAP_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS _formshift_migrations (
        id UUID PRIMARY KEY,
        field_id UUID,
        form_id UUID NOT NULL,
        kind TEXT NOT NULL,
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        old_value JSONB,
        new_value JSONB,
        backup_id UUID,
        executed_by UUID NOT NULL,
        executed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        success BOOLEAN NOT NULL,
        error TEXT,
        rollback_sql TEXT,
        reverses UUID
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_formshift_migrations_form
         ON _formshift_migrations (form_id, executed_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_formshift_migrations_reverses
         ON _formshift_migrations (reverses) WHERE reverses IS NOT NULL",
    r#"
    CREATE TABLE IF NOT EXISTS _formshift_backups (
        id UUID PRIMARY KEY,
        field_id UUID,
        form_id UUID NOT NULL,
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        snapshot JSONB NOT NULL DEFAULT '[]'::jsonb,
        kind TEXT NOT NULL,
        retain_until TIMESTAMPTZ NOT NULL,
        created_by UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_formshift_backups_form
         ON _formshift_backups (form_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_formshift_backups_retention
         ON _formshift_backups (retain_until)",
    r#"
    CREATE TABLE IF NOT EXISTS _formshift_jobs (
        id UUID PRIMARY KEY,
        seq BIGSERIAL NOT NULL,
        form_id UUID NOT NULL,
        intent JSONB NOT NULL,
        state TEXT NOT NULL DEFAULT 'queued',
        actor UUID NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        record_id UUID,
        enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_formshift_jobs_claim
         ON _formshift_jobs (seq) WHERE state = 'queued'",
    "CREATE INDEX IF NOT EXISTS idx_formshift_jobs_form
         ON _formshift_jobs (form_id, state)",
];

/// Connect a pool with the given size.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

/// Create the engine's meta tables if they do not exist yet.
pub async fn ensure_meta_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    for ddl in BOOTSTRAP_DDL {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::debug!("meta tables ready");
    Ok(())
}
