//! Migration Engine: the six transactional primitives plus preview and
//! rollback.
//!
//! Every operation runs its DDL and its metadata writes in a single
//! transaction. On failure the transaction is rolled back and a failed
//! audit record is written in a fresh transaction, so history survives
//! even a failed attempt. If that second write fails too, the failure is
//! logged and the original error is returned; the caller is never crashed
//! by the bookkeeping.

use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use formshift_core::ddl::{self, quote};
use formshift_core::{
    conversion, BackupKind, ChangeOp, ColumnType, Conversion, DataBackup, FieldCatalog,
    MigrationError, MigrationKind, MigrationPreview, MigrationRecord, SemanticType, SnapshotEntry,
};

use crate::backups::{self, PgBackupStore};
use crate::error::EngineError;
use crate::introspect;
use crate::recorder::{self, PgRecorder};

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rows per UPDATE batch during restore. Keeps one statement well under
    /// the migration timeout even for tables with tens of thousands of rows.
    pub restore_batch_size: usize,
    /// Retention window for backups the engine takes automatically.
    pub retention_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            restore_batch_size: 1000,
            retention_days: formshift_core::DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Who is doing what to which form. Threaded through every operation so the
/// audit record can name the actor and the owning form.
#[derive(Debug, Clone, Copy)]
pub struct MigrationCtx {
    pub form_id: Uuid,
    pub field_id: Option<Uuid>,
    pub actor: Uuid,
}

/// Executes single-column schema changes against live dynamic tables.
#[derive(Clone)]
pub struct MigrationEngine {
    pool: PgPool,
    recorder: PgRecorder,
    backups: PgBackupStore,
    config: EngineConfig,
}

/// Everything needed to write the audit record for an attempt, success or
/// failure, collected up front so the failure path never re-derives state.
struct Attempt {
    ctx: MigrationCtx,
    kind: MigrationKind,
    table: String,
    column: String,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
}

impl Attempt {
    fn record(
        &self,
        success: bool,
        error: Option<String>,
        rollback_sql: Option<String>,
        backup_id: Option<Uuid>,
        reverses: Option<Uuid>,
    ) -> MigrationRecord {
        MigrationRecord {
            id: Uuid::new_v4(),
            field_id: self.ctx.field_id,
            form_id: self.ctx.form_id,
            kind: self.kind,
            table_name: self.table.clone(),
            column_name: self.column.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
            backup_id,
            executed_by: self.ctx.actor,
            executed_at: Utc::now(),
            success,
            error,
            rollback_sql,
            reverses,
        }
    }
}

impl MigrationEngine {
    pub fn new(pool: PgPool, config: EngineConfig) -> Self {
        Self {
            recorder: PgRecorder::new(pool.clone()),
            backups: PgBackupStore::new(pool.clone()),
            pool,
            config,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn recorder(&self) -> &PgRecorder {
        &self.recorder
    }

    pub fn backups(&self) -> &PgBackupStore {
        &self.backups
    }

    /// Dispatch one change intent to the matching primitive.
    pub async fn apply(
        &self,
        ctx: MigrationCtx,
        table: &str,
        op: &ChangeOp,
    ) -> Result<MigrationRecord, EngineError> {
        match op {
            ChangeOp::AddField {
                column_name,
                semantic_type,
            } => self.add_column(ctx, table, column_name, *semantic_type).await,
            ChangeOp::DeleteField { column_name } => {
                self.drop_column(ctx, table, column_name, true).await
            }
            ChangeOp::RenameField { old_name, new_name } => {
                self.rename_column(ctx, table, old_name, new_name).await
            }
            ChangeOp::ChangeType {
                column_name,
                old_type,
                new_type,
            } => {
                self.migrate_column_type(ctx, table, column_name, *old_type, *new_type)
                    .await
            }
        }
    }

    /// Add a column with the mapped physical type.
    pub async fn add_column(
        &self,
        ctx: MigrationCtx,
        table: &str,
        column: &str,
        semantic_type: SemanticType,
    ) -> Result<MigrationRecord, EngineError> {
        ddl::validate_identifier(table)?;
        ddl::validate_column(column)?;
        let ty = semantic_type.column_type();
        let attempt = Attempt {
            ctx,
            kind: MigrationKind::AddColumn,
            table: table.to_string(),
            column: column.to_string(),
            old_value: None,
            new_value: Some(json!({ "new_type": ty })),
        };

        let result = self.run_add_column(&attempt, ty).await;
        self.settle(attempt, result).await
    }

    async fn run_add_column(
        &self,
        attempt: &Attempt,
        ty: ColumnType,
    ) -> Result<MigrationRecord, EngineError> {
        let mut tx = self.pool.begin().await?;
        let (table, column) = (&attempt.table, &attempt.column);

        if introspect::column_exists(&mut *tx, table, column).await? {
            return Err(MigrationError::DuplicateColumn {
                table: table.clone(),
                column: column.clone(),
            }
            .into());
        }

        sqlx::query(&ddl::add_column_sql(table, column, ty))
            .execute(&mut *tx)
            .await?;

        let record = attempt.record(
            true,
            None,
            Some(ddl::drop_column_sql(table, column)),
            None,
            None,
        );
        recorder::insert(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Drop a column, snapshotting its data first unless told otherwise.
    pub async fn drop_column(
        &self,
        ctx: MigrationCtx,
        table: &str,
        column: &str,
        with_backup: bool,
    ) -> Result<MigrationRecord, EngineError> {
        ddl::validate_identifier(table)?;
        ddl::validate_column(column)?;
        let attempt = Attempt {
            ctx,
            kind: MigrationKind::DropColumn,
            table: table.to_string(),
            column: column.to_string(),
            old_value: None,
            new_value: None,
        };

        let result = self.run_drop_column(&attempt, with_backup).await;
        self.settle(attempt, result).await
    }

    async fn run_drop_column(
        &self,
        attempt: &Attempt,
        with_backup: bool,
    ) -> Result<MigrationRecord, EngineError> {
        let mut tx = self.pool.begin().await?;
        let (table, column) = (&attempt.table, &attempt.column);

        let current =
            managed_column_type(&mut tx, table, column).await?;

        let backup_id = if with_backup {
            let backup = self
                .snapshot_in_tx(&mut tx, attempt.ctx, table, column, BackupKind::PreDrop)
                .await?;
            Some(backup.id)
        } else {
            None
        };

        sqlx::query(&ddl::drop_column_sql(table, column))
            .execute(&mut *tx)
            .await?;

        // Best-effort reverse: re-adds the column with its introspected type.
        // Data comes back via a separate restore of the backup.
        let record = MigrationRecord {
            old_value: Some(json!({ "old_type": current })),
            ..attempt.record(
                true,
                None,
                Some(ddl::add_column_sql(table, column, current)),
                backup_id,
                None,
            )
        };
        recorder::insert(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Atomic column rename.
    pub async fn rename_column(
        &self,
        ctx: MigrationCtx,
        table: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<MigrationRecord, EngineError> {
        ddl::validate_identifier(table)?;
        ddl::validate_column(old_name)?;
        ddl::validate_column(new_name)?;
        let attempt = Attempt {
            ctx,
            kind: MigrationKind::RenameColumn,
            table: table.to_string(),
            column: new_name.to_string(),
            old_value: Some(json!({ "old_name": old_name })),
            new_value: Some(json!({ "new_name": new_name })),
        };

        let result = self.run_rename_column(&attempt, old_name, new_name).await;
        self.settle(attempt, result).await
    }

    async fn run_rename_column(
        &self,
        attempt: &Attempt,
        old_name: &str,
        new_name: &str,
    ) -> Result<MigrationRecord, EngineError> {
        let mut tx = self.pool.begin().await?;
        let table = &attempt.table;

        if !introspect::column_exists(&mut *tx, table, old_name).await? {
            return Err(MigrationError::ColumnNotFound {
                table: table.clone(),
                column: old_name.to_string(),
            }
            .into());
        }
        if introspect::column_exists(&mut *tx, table, new_name).await? {
            return Err(MigrationError::DuplicateColumn {
                table: table.clone(),
                column: new_name.to_string(),
            }
            .into());
        }

        sqlx::query(&ddl::rename_column_sql(table, old_name, new_name))
            .execute(&mut *tx)
            .await?;

        let record = attempt.record(
            true,
            None,
            Some(ddl::rename_column_sql(table, new_name, old_name)),
            None,
            None,
        );
        recorder::insert(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Change a column's type, validating existing data first.
    ///
    /// The introspected current type is authoritative; `declared_old` is
    /// what the form definition believed and only lands in the audit
    /// descriptor when introspection and declaration agree.
    pub async fn migrate_column_type(
        &self,
        ctx: MigrationCtx,
        table: &str,
        column: &str,
        declared_old: SemanticType,
        new_type: SemanticType,
    ) -> Result<MigrationRecord, EngineError> {
        ddl::validate_identifier(table)?;
        ddl::validate_column(column)?;
        let to = new_type.column_type();
        let attempt = Attempt {
            ctx,
            kind: MigrationKind::ChangeType,
            table: table.to_string(),
            column: column.to_string(),
            old_value: Some(json!({ "old_type": declared_old.column_type() })),
            new_value: Some(json!({ "new_type": to })),
        };

        let result = self.run_migrate_type(&attempt, to).await;
        self.settle(attempt, result).await
    }

    async fn run_migrate_type(
        &self,
        attempt: &Attempt,
        to: ColumnType,
    ) -> Result<MigrationRecord, EngineError> {
        let mut tx = self.pool.begin().await?;
        let (table, column) = (&attempt.table, &attempt.column);

        let from = managed_column_type(&mut tx, table, column).await?;

        let using = match conversion(column, from, to) {
            Conversion::Noop => {
                // Nothing to alter; recorded so the audit trail explains
                // why the requested change produced no DDL.
                let record = MigrationRecord {
                    old_value: Some(json!({ "old_type": from })),
                    ..attempt.record(true, None, None, None, None)
                };
                recorder::insert(&mut *tx, &record).await?;
                tx.commit().await?;
                return Ok(record);
            }
            Conversion::Unsupported => {
                return Err(MigrationError::IncompatibleTypeConversion {
                    column: column.clone(),
                    from: from.sql(),
                    to: to.sql(),
                    reason: "no safe conversion path exists".to_string(),
                }
                .into());
            }
            Conversion::Checked { using, violation } => {
                let offending = introspect::violation_count(&mut *tx, table, &violation).await?;
                if offending > 0 {
                    return Err(MigrationError::IncompatibleTypeConversion {
                        column: column.clone(),
                        from: from.sql(),
                        to: to.sql(),
                        reason: format!(
                            "{offending} existing value(s) cannot be converted safely"
                        ),
                    }
                    .into());
                }
                using
            }
            Conversion::Safe { using } => using,
        };

        // Validation passed; snapshot before altering.
        let backup = self
            .snapshot_in_tx(&mut tx, attempt.ctx, table, column, BackupKind::PreTypeChange)
            .await?;

        sqlx::query(&ddl::change_type_sql(table, column, to, &using))
            .execute(&mut *tx)
            .await?;

        // Reverse casts back to the introspected old type. Lossy round trips
        // are a known, accepted limitation.
        let reverse_using = format!("{}::{}", quote(column), from.sql().to_lowercase());
        let record = MigrationRecord {
            old_value: Some(json!({ "old_type": from })),
            ..attempt.record(
                true,
                None,
                Some(ddl::change_type_sql(table, column, from, &reverse_using)),
                Some(backup.id),
                None,
            )
        };
        recorder::insert(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Snapshot a column's data into a new backup. Standalone entry point
    /// for manual backups; drop and type-change migrations call the in-tx
    /// variant so the backup commits or rolls back with the DDL.
    pub async fn backup_column(
        &self,
        ctx: MigrationCtx,
        table: &str,
        column: &str,
        kind: BackupKind,
    ) -> Result<DataBackup, EngineError> {
        ddl::validate_identifier(table)?;
        ddl::validate_column(column)?;
        let mut tx = self.pool.begin().await?;
        if !introspect::column_exists(&mut *tx, table, column).await? {
            return Err(MigrationError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            }
            .into());
        }
        let backup = self.snapshot_in_tx(&mut tx, ctx, table, column, kind).await?;
        tx.commit().await?;
        Ok(backup)
    }

    async fn snapshot_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: MigrationCtx,
        table: &str,
        column: &str,
        kind: BackupKind,
    ) -> Result<DataBackup, EngineError> {
        // Values are captured as text casts so the snapshot survives the
        // column's type changing later. An empty table gives an empty
        // snapshot, which is fine.
        let sql = format!(
            "SELECT id, {}::text AS value FROM {} ORDER BY id",
            quote(column),
            quote(table)
        );
        let rows: Vec<(i64, Option<String>)> =
            sqlx::query_as(&sql).fetch_all(&mut **tx).await?;

        let now = Utc::now();
        let backup = DataBackup {
            id: Uuid::new_v4(),
            field_id: ctx.field_id,
            form_id: ctx.form_id,
            table_name: table.to_string(),
            column_name: column.to_string(),
            snapshot: rows
                .into_iter()
                .map(|(row_id, value)| SnapshotEntry { row_id, value })
                .collect(),
            kind,
            retain_until: now + chrono::Duration::days(self.config.retention_days),
            created_by: ctx.actor,
            created_at: now,
        };
        backups::insert(&mut **tx, &backup).await?;
        tracing::info!(
            table,
            column,
            rows = backup.snapshot.len(),
            kind = kind.as_str(),
            backup_id = %backup.id,
            "column snapshot taken"
        );
        Ok(backup)
    }

    /// Re-apply a backup's values onto the target column, batched.
    ///
    /// `target_column` defaults to the column the backup was taken from.
    /// The column must exist (re-add it first after a drop) and values are
    /// cast to its current introspected type.
    pub async fn restore_backup(
        &self,
        backup_id: Uuid,
        target_column: Option<&str>,
        actor: Uuid,
    ) -> Result<u64, EngineError> {
        let backup = self
            .backups
            .get(backup_id)
            .await?
            .ok_or(MigrationError::BackupNotFound(backup_id))?;
        if backup.is_expired(Utc::now()) {
            return Err(MigrationError::BackupExpired(backup_id).into());
        }

        let table = backup.table_name.as_str();
        let column = target_column.unwrap_or(backup.column_name.as_str());
        ddl::validate_identifier(table)?;
        ddl::validate_column(column)?;

        let mut tx = self.pool.begin().await?;
        let Some(target_ty) = introspect::column_type(&mut *tx, table, column).await? else {
            return Err(MigrationError::TargetColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            }
            .into());
        };

        let update_sql = format!(
            "UPDATE {table} AS t SET {column} = v.value::{ty}
             FROM (SELECT unnest($1::bigint[]) AS row_id,
                          unnest($2::text[]) AS value) AS v
             WHERE t.id = v.row_id",
            table = quote(table),
            column = quote(column),
            ty = target_ty.sql().to_lowercase(),
        );

        let mut restored: u64 = 0;
        for chunk in backup.snapshot.chunks(self.config.restore_batch_size.max(1)) {
            let ids: Vec<i64> = chunk.iter().map(|e| e.row_id).collect();
            let values: Vec<Option<String>> = chunk.iter().map(|e| e.value.clone()).collect();
            let result = sqlx::query(&update_sql)
                .bind(&ids)
                .bind(&values)
                .execute(&mut *tx)
                .await?;
            restored += result.rows_affected();
        }
        tx.commit().await?;

        tracing::info!(
            backup_id = %backup_id,
            table,
            column,
            restored,
            actor = %actor,
            "backup restored"
        );
        Ok(restored)
    }

    /// Dry-run one change intent: what would run, what would be recorded,
    /// and what would go wrong. SELECT-only.
    pub async fn preview(&self, table: &str, op: &ChangeOp) -> Result<MigrationPreview, EngineError> {
        if let Err(e) = ddl::validate_identifier(table) {
            return Ok(MigrationPreview::rejected(e.to_string()));
        }
        if !introspect::table_exists(&self.pool, table).await? {
            return Ok(MigrationPreview::rejected(format!(
                "table {table:?} does not exist"
            )));
        }
        let estimated_rows = introspect::row_count(&self.pool, table).await?;

        let preview = match op {
            ChangeOp::AddField {
                column_name,
                semantic_type,
            } => {
                if let Err(e) = ddl::validate_column(column_name) {
                    return Ok(MigrationPreview::rejected(e.to_string()));
                }
                let mut warnings = Vec::new();
                let mut valid = true;
                if introspect::column_exists(&self.pool, table, column_name).await? {
                    valid = false;
                    warnings.push(format!("column {column_name:?} already exists"));
                }
                if *semantic_type == SemanticType::Unknown {
                    warnings.push(
                        "unrecognised field type; the column will be created as TEXT".to_string(),
                    );
                }
                MigrationPreview {
                    sql: ddl::add_column_sql(table, column_name, semantic_type.column_type()),
                    rollback_sql: Some(ddl::drop_column_sql(table, column_name)),
                    valid,
                    warnings,
                    estimated_rows,
                    requires_backup: false,
                }
            }
            ChangeOp::DeleteField { column_name } => {
                if let Err(e) = ddl::validate_column(column_name) {
                    return Ok(MigrationPreview::rejected(e.to_string()));
                }
                let current = introspect::column_type(&self.pool, table, column_name).await?;
                let mut warnings = Vec::new();
                let valid = current.is_some()
                    || introspect::column_exists(&self.pool, table, column_name).await?;
                if !valid {
                    warnings.push(format!("column {column_name:?} does not exist"));
                }
                if valid && estimated_rows > 0 {
                    warnings.push(format!(
                        "{estimated_rows} row(s) of data will be snapshotted before the drop"
                    ));
                }
                MigrationPreview {
                    sql: ddl::drop_column_sql(table, column_name),
                    rollback_sql: current
                        .map(|ty| ddl::add_column_sql(table, column_name, ty)),
                    valid,
                    warnings,
                    estimated_rows,
                    requires_backup: true,
                }
            }
            ChangeOp::RenameField { old_name, new_name } => {
                if let Err(e) = ddl::validate_column(old_name).and(ddl::validate_column(new_name)) {
                    return Ok(MigrationPreview::rejected(e.to_string()));
                }
                let mut warnings = Vec::new();
                let mut valid = true;
                if !introspect::column_exists(&self.pool, table, old_name).await? {
                    valid = false;
                    warnings.push(format!("column {old_name:?} does not exist"));
                }
                if introspect::column_exists(&self.pool, table, new_name).await? {
                    valid = false;
                    warnings.push(format!("column {new_name:?} already exists"));
                }
                MigrationPreview {
                    sql: ddl::rename_column_sql(table, old_name, new_name),
                    rollback_sql: Some(ddl::rename_column_sql(table, new_name, old_name)),
                    valid,
                    warnings,
                    estimated_rows,
                    requires_backup: false,
                }
            }
            ChangeOp::ChangeType {
                column_name,
                new_type,
                ..
            } => {
                if let Err(e) = ddl::validate_column(column_name) {
                    return Ok(MigrationPreview::rejected(e.to_string()));
                }
                let Some(from) = introspect::column_type(&self.pool, table, column_name).await?
                else {
                    return Ok(MigrationPreview::rejected(format!(
                        "column {column_name:?} does not exist or has an unmanaged type"
                    )));
                };
                let to = new_type.column_type();
                match conversion(column_name, from, to) {
                    Conversion::Noop => MigrationPreview {
                        sql: String::new(),
                        rollback_sql: None,
                        valid: true,
                        warnings: vec![format!(
                            "column is already {}; nothing to change",
                            to.sql()
                        )],
                        estimated_rows,
                        requires_backup: false,
                    },
                    Conversion::Unsupported => MigrationPreview::rejected(format!(
                        "cannot convert {} to {}: no safe conversion path exists",
                        from.sql(),
                        to.sql()
                    )),
                    Conversion::Safe { using } => MigrationPreview {
                        sql: ddl::change_type_sql(table, column_name, to, &using),
                        rollback_sql: Some(reverse_change_type(table, column_name, from)),
                        valid: true,
                        warnings: Vec::new(),
                        estimated_rows,
                        requires_backup: true,
                    },
                    Conversion::Checked { using, violation } => {
                        let offending =
                            introspect::violation_count(&self.pool, table, &violation).await?;
                        let mut warnings = Vec::new();
                        let valid = offending == 0;
                        if offending > 0 {
                            warnings.push(format!(
                                "{offending} existing value(s) cannot be converted to {}",
                                to.sql()
                            ));
                        }
                        MigrationPreview {
                            sql: ddl::change_type_sql(table, column_name, to, &using),
                            rollback_sql: Some(reverse_change_type(table, column_name, from)),
                            valid,
                            warnings,
                            estimated_rows,
                            requires_backup: true,
                        }
                    }
                }
            }
        };
        Ok(preview)
    }

    /// Execute the stored reverse SQL of an eligible record and append a new
    /// audit record linked via `reverses`. The original is never mutated.
    pub async fn rollback(
        &self,
        record_id: Uuid,
        actor: Uuid,
        catalog: &dyn FieldCatalog,
    ) -> Result<MigrationRecord, EngineError> {
        let original = self
            .recorder
            .get(record_id)
            .await?
            .ok_or_else(|| MigrationError::Validation(format!("migration {record_id} not found")))?;

        let field_exists = match original.field_id {
            Some(field_id) => catalog.field_exists(field_id).await?,
            None => false,
        };
        let already_reversed = self.recorder.is_reversed(record_id).await?;
        original
            .rollback_eligibility(field_exists, already_reversed)
            .map_err(|reason| MigrationError::RollbackIneligible { record_id, reason })?;

        // Eligibility guarantees rollback_sql is present.
        let reverse_sql = original.rollback_sql.clone().unwrap_or_default();

        let attempt = Attempt {
            ctx: MigrationCtx {
                form_id: original.form_id,
                field_id: original.field_id,
                actor,
            },
            // The new record describes the DDL actually executed.
            kind: inverse_kind(original.kind),
            table: original.table_name.clone(),
            column: original.column_name.clone(),
            old_value: original.new_value.clone(),
            new_value: original.old_value.clone(),
        };

        let result = self.run_rollback(&attempt, &reverse_sql, original.id).await;
        self.settle(attempt, result).await
    }

    async fn run_rollback(
        &self,
        attempt: &Attempt,
        reverse_sql: &str,
        original_id: Uuid,
    ) -> Result<MigrationRecord, EngineError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(reverse_sql).execute(&mut *tx).await?;

        // A rollback is terminal: no reverse-of-the-reverse is recorded.
        let record = attempt.record(true, None, None, None, Some(original_id));
        recorder::insert(&mut *tx, &record).await?;
        tx.commit().await?;
        tracing::info!(
            original = %original_id,
            record = %record.id,
            "migration rolled back"
        );
        Ok(record)
    }

    /// Success passes through; failure writes the failed audit record in a
    /// fresh transaction (the operation's own transaction is already gone)
    /// before returning the original error.
    async fn settle(
        &self,
        attempt: Attempt,
        result: Result<MigrationRecord, EngineError>,
    ) -> Result<MigrationRecord, EngineError> {
        match result {
            Ok(record) => Ok(record),
            Err(err) => {
                let failed = attempt.record(false, Some(err.to_string()), None, None, None);
                if let Err(audit_err) = recorder::insert(&self.pool, &failed).await {
                    // Never let bookkeeping mask the real failure.
                    tracing::error!(
                        error = %audit_err,
                        original_error = %err,
                        table = %attempt.table,
                        column = %attempt.column,
                        "failed to write failure record"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Introspect a column the engine is about to alter. A column that exists
/// but carries a type outside the generated set (hand-altered table) gets
/// its own message; lumping it in with "not found" would send the operator
/// hunting for a column that is plainly there.
async fn managed_column_type(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
) -> Result<ColumnType, EngineError> {
    if let Some(ty) = introspect::column_type(&mut **tx, table, column).await? {
        return Ok(ty);
    }
    if introspect::column_exists(&mut **tx, table, column).await? {
        return Err(MigrationError::Validation(format!(
            "column {column:?} on table {table:?} has a type the engine does not manage; \
             it was altered outside the migration engine"
        ))
        .into());
    }
    Err(MigrationError::ColumnNotFound {
        table: table.to_string(),
        column: column.to_string(),
    }
    .into())
}

fn inverse_kind(kind: MigrationKind) -> MigrationKind {
    match kind {
        MigrationKind::AddColumn => MigrationKind::DropColumn,
        MigrationKind::DropColumn => MigrationKind::AddColumn,
        MigrationKind::RenameColumn => MigrationKind::RenameColumn,
        MigrationKind::ChangeType => MigrationKind::ChangeType,
    }
}

fn reverse_change_type(table: &str, column: &str, from: ColumnType) -> String {
    let using = format!("{}::{}", quote(column), from.sql().to_lowercase());
    ddl::change_type_sql(table, column, from, &using)
}
