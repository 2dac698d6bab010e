//! In-process dispatcher and worker pool for the migration queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Semaphore};
use uuid::Uuid;

use chrono::Utc;

use formshift_core::{ChangeIntent, ChangeOp, FieldCatalog, MigrationKind, MigrationRecord};

use crate::engine::{MigrationCtx, MigrationEngine};
use crate::error::EngineError;
use crate::queue::store::{MigrationJob, PgJobStore};
use crate::recorder;

/// Per-form lock map. Migrations on the same form are serialized; different
/// forms proceed in parallel.
#[derive(Clone, Default)]
pub struct FormLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl FormLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, form_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(form_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop lock entries no task is holding.
    pub async fn cleanup(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub async fn active_forms(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Tuning knobs for the queue runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently executing migrations (across forms).
    pub workers: usize,
    /// How long the dispatcher sleeps when the queue is empty.
    pub poll_interval: Duration,
    /// Per-migration execution timeout. Seconds, not minutes: backup and
    /// restore are batched specifically to stay under this.
    pub job_timeout: Duration,
    /// Transient failures are retried up to this many attempts, then the
    /// job is failed for good.
    pub max_attempts: i32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Claims jobs from the durable store and runs them on a bounded pool.
pub struct QueueRuntime {
    store: PgJobStore,
    engine: MigrationEngine,
    catalog: Arc<dyn FieldCatalog>,
    locks: FormLocks,
    semaphore: Arc<Semaphore>,
    config: RuntimeConfig,
}

impl QueueRuntime {
    pub fn new(
        store: PgJobStore,
        engine: MigrationEngine,
        catalog: Arc<dyn FieldCatalog>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.workers.max(1))),
            store,
            engine,
            catalog,
            locks: FormLocks::new(),
            config,
        }
    }

    /// Run until `shutdown` flips to true. Recovers interrupted jobs first.
    ///
    /// Shutdown is graceful by construction: the dispatcher stops claiming,
    /// and in-flight DDL is never aborted mid-transaction; it completes or
    /// fails naturally and is recorded either way.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.store.recover_interrupted().await {
            tracing::error!(error = %e, "startup recovery failed");
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let job = match self.store.claim_next().await {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(error = %e, "claim failed");
                    None
                }
            };

            match job {
                Some(job) => {
                    let runtime = Arc::clone(&self);
                    let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        // Semaphore is never closed while the runtime lives.
                        Err(_) => break,
                    };
                    tokio::spawn(async move {
                        let _permit = permit;
                        runtime.process(job).await;
                        runtime.locks.cleanup().await;
                    });
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        // Wait for in-flight workers to drain.
        let _ = self
            .semaphore
            .acquire_many(self.config.workers.max(1) as u32)
            .await;
        tracing::info!("queue runtime stopped");
    }

    /// Execute one claimed job. A failure here never poisons other forms'
    /// queues: the job is marked failed (or requeued) and the worker moves
    /// on.
    async fn process(&self, job: MigrationJob) {
        let form_lock = self.locks.lock_for(job.form_id).await;
        let _guard = form_lock.lock().await;

        tracing::info!(
            job = %job.id,
            form = %job.form_id,
            kind = job.intent.op.kind(),
            attempt = job.attempts,
            "executing migration job"
        );

        let outcome = tokio::time::timeout(
            self.config.job_timeout,
            self.execute_intent(&job.intent, job.actor),
        )
        .await
        .unwrap_or(Err(EngineError::Timeout(self.config.job_timeout)));

        let settle = match outcome {
            Ok(record) => self.store.mark_completed(job.id, record.id).await,
            Err(err) if err.is_domain() => {
                // Domain errors are deterministic; retrying cannot help.
                // The engine already wrote the failed audit record.
                tracing::warn!(job = %job.id, error = %err, "migration rejected");
                self.store.mark_failed(job.id, &err.to_string(), None).await
            }
            Err(err) if job.attempts < self.config.max_attempts => {
                tracing::warn!(
                    job = %job.id,
                    error = %err,
                    attempt = job.attempts,
                    "transient failure, requeueing"
                );
                self.store.requeue(job.id, &err.to_string()).await
            }
            Err(err) => {
                tracing::error!(job = %job.id, error = %err, "migration job failed for good");
                // Timeouts and lookup failures never reach the engine's own
                // failure bookkeeping, so the audit record is written here.
                self.audit_failure(&job, &err).await;
                self.store.mark_failed(job.id, &err.to_string(), None).await
            }
        };

        if let Err(e) = settle {
            tracing::error!(job = %job.id, error = %e, "failed to settle job state");
        }
    }

    /// Failed audit record for errors the engine never saw through: the
    /// table name is best-effort (the lookup itself may be what failed).
    async fn audit_failure(&self, job: &MigrationJob, err: &EngineError) {
        let intent = &job.intent;
        let table = self
            .catalog
            .table_name(intent.form_id, intent.subform_id)
            .await
            .unwrap_or_default();
        let (kind, column) = match &intent.op {
            ChangeOp::AddField { column_name, .. } => (MigrationKind::AddColumn, column_name),
            ChangeOp::DeleteField { column_name } => (MigrationKind::DropColumn, column_name),
            ChangeOp::RenameField { new_name, .. } => (MigrationKind::RenameColumn, new_name),
            ChangeOp::ChangeType { column_name, .. } => (MigrationKind::ChangeType, column_name),
        };
        let record = MigrationRecord {
            id: Uuid::new_v4(),
            field_id: Some(intent.field_id),
            form_id: intent.form_id,
            kind,
            table_name: table,
            column_name: column.clone(),
            old_value: None,
            new_value: None,
            backup_id: None,
            executed_by: job.actor,
            executed_at: Utc::now(),
            success: false,
            error: Some(err.to_string()),
            rollback_sql: None,
            reverses: None,
        };
        if let Err(e) = recorder::insert(self.engine.pool(), &record).await {
            tracing::error!(job = %job.id, error = %e, "failed to write failure record");
        }
    }

    async fn execute_intent(
        &self,
        intent: &ChangeIntent,
        actor: Uuid,
    ) -> Result<formshift_core::MigrationRecord, EngineError> {
        let table = self
            .catalog
            .table_name(intent.form_id, intent.subform_id)
            .await?;
        let ctx = MigrationCtx {
            form_id: intent.form_id,
            field_id: Some(intent.field_id),
            actor,
        };
        self.engine.apply(ctx, &table, &intent.op).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn same_form_is_serialized() {
        let locks = FormLocks::new();
        let form = Uuid::from_u128(1);
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let peak = Arc::clone(&peak);
            let current = Arc::clone(&current);
            handles.push(tokio::spawn(async move {
                let lock = locks.lock_for(form).await;
                let _guard = lock.lock().await;
                let n = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_forms_run_in_parallel() {
        let locks = FormLocks::new();
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..4u128 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let lock = locks.lock_for(Uuid::from_u128(i)).await;
                let _guard = lock.lock().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(
            start.elapsed() < Duration::from_millis(200),
            "expected parallel execution, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn cleanup_drops_idle_locks() {
        let locks = FormLocks::new();
        {
            let _lock = locks.lock_for(Uuid::from_u128(7)).await;
        }
        assert_eq!(locks.active_forms().await, 1);
        locks.cleanup().await;
        assert_eq!(locks.active_forms().await, 0);
    }
}
