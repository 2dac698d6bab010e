//! Persistent job store backing the migration queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use formshift_core::ChangeIntent;

use crate::error::EngineError;

/// Lifecycle of a queued migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }
}

/// One durable queue entry.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub id: Uuid,
    /// FIFO position, assigned by the database.
    pub seq: i64,
    pub form_id: Uuid,
    pub intent: ChangeIntent,
    pub state: JobState,
    pub actor: Uuid,
    pub attempts: i32,
    pub error: Option<String>,
    /// The audit record this job produced, once finished.
    pub record_id: Option<Uuid>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What `enqueue` hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub state: JobState,
    /// Number of jobs queued ahead of this one for the same form.
    pub queue_position: i64,
}

/// Waiting/active/completed/failed/cancelled counts, per form or global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl QueueStatus {
    pub fn total(&self) -> i64 {
        self.waiting + self.active + self.completed + self.failed + self.cancelled
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    seq: i64,
    form_id: Uuid,
    intent: serde_json::Value,
    state: String,
    actor: Uuid,
    attempts: i32,
    error: Option<String>,
    record_id: Option<Uuid>,
    enqueued_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for MigrationJob {
    type Error = EngineError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state = JobState::parse(&row.state).ok_or_else(|| {
            EngineError::Db(sqlx::Error::Decode(
                format!("unknown job state {:?}", row.state).into(),
            ))
        })?;
        Ok(MigrationJob {
            id: row.id,
            seq: row.seq,
            form_id: row.form_id,
            intent: serde_json::from_value(row.intent)?,
            state,
            actor: row.actor,
            attempts: row.attempts,
            error: row.error,
            record_id: row.record_id,
            enqueued_at: row.enqueued_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, seq, form_id, intent, state, actor, attempts,
     error, record_id, enqueued_at, started_at, finished_at";

/// Durable queue operations.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue one intent. Non-blocking: a single INSERT plus a position
    /// count, so a form save never waits on DDL.
    pub async fn enqueue(
        &self,
        intent: &ChangeIntent,
        actor: Uuid,
    ) -> Result<JobHandle, EngineError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO _formshift_jobs (id, form_id, intent, actor)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(intent.form_id)
        .bind(serde_json::to_value(intent)?)
        .bind(actor)
        .execute(&self.pool)
        .await?;

        let (position,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM _formshift_jobs j
             WHERE j.form_id = $1 AND j.state = 'queued'
               AND j.seq < (SELECT seq FROM _formshift_jobs WHERE id = $2)",
        )
        .bind(intent.form_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(JobHandle {
            job_id: id,
            state: JobState::Queued,
            queue_position: position,
        })
    }

    /// Claim the oldest queued job of any form that has nothing running.
    ///
    /// Runs as one transaction. `FOR UPDATE SKIP LOCKED` keeps concurrent
    /// dispatchers off the same row, but the `NOT EXISTS` guard alone cannot
    /// enforce per-form exclusion across processes: another dispatcher's
    /// uncommitted `running` update is invisible under READ COMMITTED and
    /// SKIP LOCKED moves past its row. A per-form advisory lock held for the
    /// claim transaction serializes the claims themselves; once a competing
    /// claim has committed, the re-check below sees its `running` row.
    pub async fn claim_next(&self) -> Result<Option<MigrationJob>, EngineError> {
        let mut tx = self.pool.begin().await?;

        let candidate: Option<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT j.id, j.form_id FROM _formshift_jobs j
             WHERE j.state = 'queued'
               AND NOT EXISTS (
                   SELECT 1 FROM _formshift_jobs r
                   WHERE r.form_id = j.form_id AND r.state = 'running'
               )
             ORDER BY j.seq
             LIMIT 1
             FOR UPDATE SKIP LOCKED",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some((job_id, form_id)) = candidate else {
            return Ok(None);
        };

        let (locked,): (bool,) = sqlx::query_as(
            "SELECT pg_try_advisory_xact_lock(hashtextextended($1::text, 0))",
        )
        .bind(form_id)
        .fetch_one(&mut *tx)
        .await?;
        if !locked {
            // Another dispatcher is mid-claim for this form; retry next poll.
            return Ok(None);
        }
        let (running,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM _formshift_jobs
                 WHERE form_id = $1 AND state = 'running'
             )",
        )
        .bind(form_id)
        .fetch_one(&mut *tx)
        .await?;
        if running {
            return Ok(None);
        }

        let row: Option<JobRow> = sqlx::query_as(&format!(
            "UPDATE _formshift_jobs
             SET state = 'running', started_at = now(), attempts = attempts + 1
             WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn mark_completed(&self, job_id: Uuid, record_id: Uuid) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE _formshift_jobs
             SET state = 'completed', record_id = $2, finished_at = now()
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        error: &str,
        record_id: Option<Uuid>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE _formshift_jobs
             SET state = 'failed', error = $2, record_id = $3, finished_at = now()
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(error)
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a job back in the queue after a transient failure.
    pub async fn requeue(&self, job_id: Uuid, error: &str) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE _formshift_jobs
             SET state = 'queued', error = $2, started_at = NULL
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancel a job that has not started. Running jobs are never aborted
    /// mid-DDL; they finish or fail on their own.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool, EngineError> {
        let result = sqlx::query(
            "UPDATE _formshift_jobs
             SET state = 'cancelled', finished_at = now()
             WHERE id = $1 AND state = 'queued'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Startup recovery: anything still marked running belonged to a dead
    /// process. Requeue it for at-least-once delivery; a duplicate apply
    /// fails loudly (DuplicateColumn / ColumnNotFound) and is audited,
    /// never silently applied twice.
    pub async fn recover_interrupted(&self) -> Result<u64, EngineError> {
        let result = sqlx::query(
            "UPDATE _formshift_jobs
             SET state = 'queued', started_at = NULL
             WHERE state = 'running'",
        )
        .execute(&self.pool)
        .await?;
        let n = result.rows_affected();
        if n > 0 {
            tracing::warn!(recovered = n, "requeued jobs interrupted by restart");
        }
        Ok(n)
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<MigrationJob>, EngineError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM _formshift_jobs WHERE id = $1");
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Queue counts for one form, or globally when `form_id` is `None`.
    pub async fn status(&self, form_id: Option<Uuid>) -> Result<QueueStatus, EngineError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM _formshift_jobs
             WHERE $1::uuid IS NULL OR form_id = $1
             GROUP BY state",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        let mut status = QueueStatus::default();
        for (state, count) in rows {
            match JobState::parse(&state) {
                Some(JobState::Queued) => status.waiting = count,
                Some(JobState::Running) => status.active = count,
                Some(JobState::Completed) => status.completed = count,
                Some(JobState::Failed) => status.failed = count,
                Some(JobState::Cancelled) => status.cancelled = count,
                None => tracing::warn!(state, "unknown job state in queue table"),
            }
        }
        Ok(status)
    }
}
