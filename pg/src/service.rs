//! Role-gated facade over the engine, queue and stores.
//!
//! This is the surface the (out-of-scope) API layer calls. The service
//! implements no role logic of its own; it asks the platform's
//! [`RoleProvider`] and enforces the contract: preview, history, listings
//! and enqueue need admin-or-above; rollback, restore, cleanup and the
//! field-detach hook need the top admin role.

use std::sync::Arc;

use uuid::Uuid;

use formshift_core::{
    ChangeIntent, DataBackup, FieldCatalog, MigrationError, MigrationPreview, MigrationRecord,
    RoleProvider,
};

use crate::backups::{BackupSummary, CleanupReport, PgBackupStore};
use crate::engine::MigrationEngine;
use crate::error::EngineError;
use crate::queue::{JobHandle, PgJobStore, QueueStatus};
use crate::recorder::{HistoryFilter, PgRecorder};

/// Wires the migration components behind the platform's role checks.
#[derive(Clone)]
pub struct MigrationService {
    engine: MigrationEngine,
    jobs: PgJobStore,
    catalog: Arc<dyn FieldCatalog>,
    roles: Arc<dyn RoleProvider>,
}

impl MigrationService {
    pub fn new(
        engine: MigrationEngine,
        jobs: PgJobStore,
        catalog: Arc<dyn FieldCatalog>,
        roles: Arc<dyn RoleProvider>,
    ) -> Self {
        Self {
            engine,
            jobs,
            catalog,
            roles,
        }
    }

    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    fn recorder(&self) -> &PgRecorder {
        self.engine.recorder()
    }

    fn backups(&self) -> &PgBackupStore {
        self.engine.backups()
    }

    async fn require_admin(&self, actor: Uuid, action: &str) -> Result<(), EngineError> {
        let roles = self.roles.roles(actor).await?;
        if !roles.admin_or_above() {
            return Err(MigrationError::Forbidden {
                actor,
                action: action.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn require_super_admin(&self, actor: Uuid, action: &str) -> Result<(), EngineError> {
        let roles = self.roles.roles(actor).await?;
        if !roles.is_super_admin {
            return Err(MigrationError::Forbidden {
                actor,
                action: action.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Dry-run a batch of intents against their target tables.
    pub async fn preview(
        &self,
        actor: Uuid,
        intents: &[ChangeIntent],
    ) -> Result<Vec<MigrationPreview>, EngineError> {
        self.require_admin(actor, "preview migrations").await?;
        let mut previews = Vec::with_capacity(intents.len());
        for intent in intents {
            let table = self
                .catalog
                .table_name(intent.form_id, intent.subform_id)
                .await?;
            previews.push(self.engine.preview(&table, &intent.op).await?);
        }
        Ok(previews)
    }

    /// Enqueue a batch of intents for asynchronous execution, in order.
    pub async fn enqueue(
        &self,
        actor: Uuid,
        intents: &[ChangeIntent],
    ) -> Result<Vec<JobHandle>, EngineError> {
        self.require_admin(actor, "enqueue migrations").await?;
        let mut handles = Vec::with_capacity(intents.len());
        for intent in intents {
            handles.push(self.jobs.enqueue(intent, actor).await?);
        }
        Ok(handles)
    }

    /// Paginated migration history for a form.
    pub async fn history(
        &self,
        actor: Uuid,
        form_id: Uuid,
        filter: HistoryFilter,
    ) -> Result<Vec<MigrationRecord>, EngineError> {
        self.require_admin(actor, "read migration history").await?;
        self.recorder().history(form_id, &filter).await
    }

    /// Roll back an eligible migration. Super-admin only.
    pub async fn rollback(
        &self,
        actor: Uuid,
        record_id: Uuid,
    ) -> Result<MigrationRecord, EngineError> {
        self.require_super_admin(actor, "roll back a migration")
            .await?;
        self.engine
            .rollback(record_id, actor, self.catalog.as_ref())
            .await
    }

    /// Paginated backups of a form.
    pub async fn list_backups(
        &self,
        actor: Uuid,
        form_id: Uuid,
        include_expired: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BackupSummary>, EngineError> {
        self.require_admin(actor, "list backups").await?;
        self.backups()
            .list(form_id, include_expired, limit, offset)
            .await
    }

    /// Backups whose retention deadline is within `days` days.
    pub async fn backups_expiring_within(
        &self,
        actor: Uuid,
        days: i64,
    ) -> Result<Vec<BackupSummary>, EngineError> {
        self.require_admin(actor, "list expiring backups").await?;
        self.backups().expiring_within(days).await
    }

    pub async fn get_backup(
        &self,
        actor: Uuid,
        backup_id: Uuid,
    ) -> Result<Option<DataBackup>, EngineError> {
        self.require_admin(actor, "read a backup").await?;
        self.backups().get(backup_id).await
    }

    /// Restore a backup's data onto its column. Super-admin only.
    /// Returns the number of rows written.
    pub async fn restore_backup(
        &self,
        actor: Uuid,
        backup_id: Uuid,
        target_column: Option<&str>,
    ) -> Result<u64, EngineError> {
        self.require_super_admin(actor, "restore a backup").await?;
        self.engine
            .restore_backup(backup_id, target_column, actor)
            .await
    }

    /// Age-based backup cleanup, optionally as a dry-run. Super-admin only.
    pub async fn cleanup(
        &self,
        actor: Uuid,
        retention_days: i64,
        dry_run: bool,
    ) -> Result<CleanupReport, EngineError> {
        self.require_super_admin(actor, "clean up backups").await?;
        self.backups().cleanup(retention_days, dry_run).await
    }

    /// Queue counts for one form, or globally.
    pub async fn queue_status(
        &self,
        actor: Uuid,
        form_id: Option<Uuid>,
    ) -> Result<QueueStatus, EngineError> {
        self.require_admin(actor, "read queue status").await?;
        self.jobs.status(form_id).await
    }

    /// Cancel a queued job. Super-admin only; running jobs are left alone.
    pub async fn cancel_job(&self, actor: Uuid, job_id: Uuid) -> Result<bool, EngineError> {
        self.require_super_admin(actor, "cancel a queued migration")
            .await?;
        self.jobs.cancel(job_id).await
    }

    /// Platform hook for field deletion: null the field reference on audit
    /// and backup rows instead of cascading. History outlives fields.
    pub async fn detach_field(&self, actor: Uuid, field_id: Uuid) -> Result<(), EngineError> {
        self.require_super_admin(actor, "detach a deleted field")
            .await?;
        self.recorder().detach_field(field_id).await?;
        self.backups().detach_field(field_id).await?;
        Ok(())
    }
}
