//! Migration Recorder: the append-only audit log store.
//!
//! Records are inserted once and never updated or deleted. Inserts are
//! generic over the executor so the engine can write the success record
//! inside the operation's own transaction and the failure record in a
//! fresh one after rollback.

use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use formshift_core::{MigrationKind, MigrationRecord};

use crate::error::EngineError;

/// Filters for history queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only successes (`Some(true)`) or only failures (`Some(false)`).
    pub success: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl HistoryFilter {
    pub fn latest(limit: i64) -> Self {
        Self {
            success: None,
            limit,
            offset: 0,
        }
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: Uuid,
    field_id: Option<Uuid>,
    form_id: Uuid,
    kind: String,
    table_name: String,
    column_name: String,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
    backup_id: Option<Uuid>,
    executed_by: Uuid,
    executed_at: chrono::DateTime<chrono::Utc>,
    success: bool,
    error: Option<String>,
    rollback_sql: Option<String>,
    reverses: Option<Uuid>,
}

impl TryFrom<RecordRow> for MigrationRecord {
    type Error = EngineError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let kind = MigrationKind::parse(&row.kind).ok_or_else(|| {
            EngineError::Db(sqlx::Error::Decode(
                format!("unknown migration kind {:?}", row.kind).into(),
            ))
        })?;
        Ok(MigrationRecord {
            id: row.id,
            field_id: row.field_id,
            form_id: row.form_id,
            kind,
            table_name: row.table_name,
            column_name: row.column_name,
            old_value: row.old_value,
            new_value: row.new_value,
            backup_id: row.backup_id,
            executed_by: row.executed_by,
            executed_at: row.executed_at,
            success: row.success,
            error: row.error,
            rollback_sql: row.rollback_sql,
            reverses: row.reverses,
        })
    }
}

const SELECT_COLUMNS: &str = "id, field_id, form_id, kind, table_name, column_name,
     old_value, new_value, backup_id, executed_by, executed_at,
     success, error, rollback_sql, reverses";

/// Append one record to the audit log.
pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    record: &MigrationRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO _formshift_migrations
             (id, field_id, form_id, kind, table_name, column_name,
              old_value, new_value, backup_id, executed_by, executed_at,
              success, error, rollback_sql, reverses)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(record.id)
    .bind(record.field_id)
    .bind(record.form_id)
    .bind(record.kind.as_str())
    .bind(&record.table_name)
    .bind(&record.column_name)
    .bind(&record.old_value)
    .bind(&record.new_value)
    .bind(record.backup_id)
    .bind(record.executed_by)
    .bind(record.executed_at)
    .bind(record.success)
    .bind(&record.error)
    .bind(&record.rollback_sql)
    .bind(record.reverses)
    .execute(executor)
    .await?;
    Ok(())
}

/// Read-side of the audit log.
#[derive(Clone)]
pub struct PgRecorder {
    pool: PgPool,
}

impl PgRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<MigrationRecord>, EngineError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM _formshift_migrations WHERE id = $1");
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Paginated history for a form, newest first.
    pub async fn history(
        &self,
        form_id: Uuid,
        filter: &HistoryFilter,
    ) -> Result<Vec<MigrationRecord>, EngineError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM _formshift_migrations
             WHERE form_id = $1 AND ($2::boolean IS NULL OR success = $2)
             ORDER BY executed_at DESC, id
             LIMIT $3 OFFSET $4"
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(form_id)
            .bind(filter.success)
            .bind(filter.limit.max(1))
            .bind(filter.offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Whether a later successful record already reversed `record_id`.
    pub async fn is_reversed(&self, record_id: Uuid) -> Result<bool, EngineError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM _formshift_migrations
                 WHERE reverses = $1 AND success = true
             )",
        )
        .bind(record_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Null the field reference on audit rows when the platform deletes a
    /// field. History must outlive the field it describes, so this is the
    /// only mutation the log ever sees, and it touches no audited content.
    pub async fn detach_field(&self, field_id: Uuid) -> Result<u64, EngineError> {
        let result = sqlx::query(
            "UPDATE _formshift_migrations SET field_id = NULL WHERE field_id = $1",
        )
        .bind(field_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
