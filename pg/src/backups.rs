//! Backup Store: column snapshots with retention deadlines.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use formshift_core::{BackupKind, DataBackup, SnapshotEntry};

use crate::error::EngineError;

#[derive(FromRow)]
struct BackupRow {
    id: Uuid,
    field_id: Option<Uuid>,
    form_id: Uuid,
    table_name: String,
    column_name: String,
    snapshot: serde_json::Value,
    kind: String,
    retain_until: DateTime<Utc>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<BackupRow> for DataBackup {
    type Error = EngineError;

    fn try_from(row: BackupRow) -> Result<Self, Self::Error> {
        let snapshot: Vec<SnapshotEntry> = serde_json::from_value(row.snapshot)?;
        let kind = BackupKind::parse(&row.kind).ok_or_else(|| {
            EngineError::Db(sqlx::Error::Decode(
                format!("unknown backup kind {:?}", row.kind).into(),
            ))
        })?;
        Ok(DataBackup {
            id: row.id,
            field_id: row.field_id,
            form_id: row.form_id,
            table_name: row.table_name,
            column_name: row.column_name,
            snapshot,
            kind,
            retain_until: row.retain_until,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, field_id, form_id, table_name, column_name,
     snapshot, kind, retain_until, created_by, created_at";

/// Persist a backup. Executor-generic so drop and type-change migrations
/// can write the backup inside their own transaction.
pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    backup: &DataBackup,
) -> Result<(), EngineError> {
    sqlx::query(
        "INSERT INTO _formshift_backups
             (id, field_id, form_id, table_name, column_name,
              snapshot, kind, retain_until, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(backup.id)
    .bind(backup.field_id)
    .bind(backup.form_id)
    .bind(&backup.table_name)
    .bind(&backup.column_name)
    .bind(serde_json::to_value(&backup.snapshot)?)
    .bind(backup.kind.as_str())
    .bind(backup.retain_until)
    .bind(backup.created_by)
    .bind(backup.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Summary line for listings and cleanup dry-runs; snapshots can be large,
/// so these queries never pull the snapshot column.
#[derive(Debug, Clone, FromRow)]
pub struct BackupSummary {
    pub id: Uuid,
    pub form_id: Uuid,
    pub table_name: String,
    pub column_name: String,
    pub kind: String,
    pub row_count: i64,
    pub retain_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// What a cleanup pass did, or would do.
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub count: u64,
    /// Up to ten of the affected backups, oldest first.
    pub samples: Vec<BackupSummary>,
}

/// Read/delete side of the backup store.
#[derive(Clone)]
pub struct PgBackupStore {
    pool: PgPool,
}

impl PgBackupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<DataBackup>, EngineError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM _formshift_backups WHERE id = $1");
        let row: Option<BackupRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Paginated backups of a form, newest first. Expired backups are
    /// hidden unless asked for.
    pub async fn list(
        &self,
        form_id: Uuid,
        include_expired: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BackupSummary>, EngineError> {
        let rows: Vec<BackupSummary> = sqlx::query_as(
            "SELECT id, form_id, table_name, column_name, kind,
                    jsonb_array_length(snapshot)::bigint AS row_count,
                    retain_until, created_at
             FROM _formshift_backups
             WHERE form_id = $1 AND ($2 OR retain_until >= now())
             ORDER BY created_at DESC, id
             LIMIT $3 OFFSET $4",
        )
        .bind(form_id)
        .bind(include_expired)
        .bind(limit.max(1))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Backups whose retention deadline falls within the next `days` days.
    /// Used for proactive expiry warnings.
    pub async fn expiring_within(&self, days: i64) -> Result<Vec<BackupSummary>, EngineError> {
        let rows: Vec<BackupSummary> = sqlx::query_as(
            "SELECT id, form_id, table_name, column_name, kind,
                    jsonb_array_length(snapshot)::bigint AS row_count,
                    retain_until, created_at
             FROM _formshift_backups
             WHERE retain_until >= now() AND retain_until < now() + ($1 || ' days')::interval
             ORDER BY retain_until",
        )
        .bind(days.max(0).to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete backups past their retention deadline. The sweeper's tick.
    pub async fn delete_expired(&self) -> Result<u64, EngineError> {
        let result = sqlx::query("DELETE FROM _formshift_backups WHERE retain_until < now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Age-based cleanup: delete (or, in dry-run, report) backups created
    /// more than `retention_days` ago.
    pub async fn cleanup(
        &self,
        retention_days: i64,
        dry_run: bool,
    ) -> Result<CleanupReport, EngineError> {
        let cutoff = Utc::now() - Duration::days(retention_days.max(0));

        let samples: Vec<BackupSummary> = sqlx::query_as(
            "SELECT id, form_id, table_name, column_name, kind,
                    jsonb_array_length(snapshot)::bigint AS row_count,
                    retain_until, created_at
             FROM _formshift_backups
             WHERE created_at < $1
             ORDER BY created_at
             LIMIT 10",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        if dry_run {
            let row: (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM _formshift_backups WHERE created_at < $1")
                    .bind(cutoff)
                    .fetch_one(&self.pool)
                    .await?;
            return Ok(CleanupReport {
                dry_run: true,
                count: row.0 as u64,
                samples,
            });
        }

        let result = sqlx::query("DELETE FROM _formshift_backups WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(CleanupReport {
            dry_run: false,
            count: result.rows_affected(),
            samples,
        })
    }

    /// Explicit admin deletion of one backup.
    pub async fn delete(&self, id: Uuid) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM _formshift_backups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// See [`crate::recorder::PgRecorder::detach_field`].
    pub async fn detach_field(&self, field_id: Uuid) -> Result<u64, EngineError> {
        let result =
            sqlx::query("UPDATE _formshift_backups SET field_id = NULL WHERE field_id = $1")
                .bind(field_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
