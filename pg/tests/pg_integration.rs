//! Integration tests against a live PostgreSQL.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p formshift-pg --features pg-tests

#![cfg(feature = "pg-tests")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use formshift_core::ddl::quote;
use formshift_core::{
    ChangeIntent, ChangeOp, FieldCatalog, LookupError, MigrationError, MigrationKind,
    SemanticType,
};
use formshift_pg::{
    ensure_meta_tables, EngineConfig, EngineError, HistoryFilter, MigrationCtx, MigrationEngine,
    PgJobStore, QueueRuntime, RuntimeConfig,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for pg-tests");
    let pool = formshift_pg::connect(&url, 5).await.expect("connect");
    ensure_meta_tables(&pool).await.expect("bootstrap");
    pool
}

fn scratch_table() -> String {
    format!("t_{}", Uuid::new_v4().simple())
}

async fn create_dynamic_table(pool: &PgPool, table: &str) {
    let ddl = format!(
        "CREATE TABLE {} (
             id BIGSERIAL PRIMARY KEY,
             submission_id UUID,
             parent_row_id BIGINT,
             created_by UUID,
             created_at TIMESTAMPTZ NOT NULL DEFAULT now()
         )",
        quote(table)
    );
    sqlx::query(&ddl).execute(pool).await.expect("create table");
}

async fn drop_table(pool: &PgPool, table: &str) {
    let ddl = format!("DROP TABLE IF EXISTS {}", quote(table));
    let _ = sqlx::query(&ddl).execute(pool).await;
}

fn engine(pool: &PgPool) -> MigrationEngine {
    MigrationEngine::new(pool.clone(), EngineConfig::default())
}

fn ctx(form_id: Uuid) -> MigrationCtx {
    MigrationCtx {
        form_id,
        field_id: Some(Uuid::new_v4()),
        actor: Uuid::new_v4(),
    }
}

// The jobs table is shared: tests that enqueue or claim take this lock so
// one test's dispatcher never claims another test's jobs.
static QUEUE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

async fn purge_queue(pool: &PgPool) {
    sqlx::query("DELETE FROM _formshift_jobs WHERE state IN ('queued', 'running')")
        .execute(pool)
        .await
        .expect("purge queue");
}

struct FakeCatalog {
    table: String,
    field_exists: bool,
}

#[async_trait]
impl FieldCatalog for FakeCatalog {
    async fn table_name(&self, _: Uuid, _: Option<Uuid>) -> Result<String, LookupError> {
        Ok(self.table.clone())
    }

    async fn field_exists(&self, _: Uuid) -> Result<bool, LookupError> {
        Ok(self.field_exists)
    }
}

#[tokio::test]
async fn scenario_a_add_column_records_reverse_drop() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;

    let engine = engine(&pool);
    let record = engine
        .add_column(ctx(Uuid::new_v4()), &table, "age", SemanticType::Number)
        .await
        .expect("add column");

    assert_eq!(record.kind, MigrationKind::AddColumn);
    assert!(record.success);
    assert_eq!(
        record.rollback_sql.as_deref(),
        Some(format!("ALTER TABLE {} DROP COLUMN \"age\"", quote(&table)).as_str())
    );

    // Adding it again is a duplicate, and the failure is audited.
    let c = ctx(record.form_id);
    let err = engine
        .add_column(c, &table, "age", SemanticType::Number)
        .await
        .expect_err("duplicate add must fail");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::DuplicateColumn { .. })
    ));
    let history = engine
        .recorder()
        .history(record.form_id, &HistoryFilter::latest(10))
        .await
        .expect("history");
    assert!(history.iter().any(|r| !r.success && r.error.is_some()));

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn round_trip_drop_with_backup_then_restore() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    engine
        .add_column(ctx(form_id), &table, "old_phone", SemanticType::Phone)
        .await
        .expect("add");
    for value in ["0812345678", "0898765432"] {
        let sql = format!(
            "INSERT INTO {} (old_phone) VALUES ($1)",
            quote(&table)
        );
        sqlx::query(&sql).bind(value).execute(&pool).await.expect("insert");
    }

    // Scenario B: drop with backup captures both rows in row-id order.
    let dropped = engine
        .drop_column(ctx(form_id), &table, "old_phone", true)
        .await
        .expect("drop");
    let backup_id = dropped.backup_id.expect("backup taken");
    let backup = engine
        .backups()
        .get(backup_id)
        .await
        .expect("get backup")
        .expect("backup exists");
    let values: Vec<_> = backup
        .snapshot
        .iter()
        .map(|e| e.value.clone().unwrap())
        .collect();
    assert_eq!(values, vec!["0812345678", "0898765432"]);

    // Listings report the snapshot size without decoding the snapshot.
    let summaries = engine
        .backups()
        .list(form_id, true, 10, 0)
        .await
        .expect("list backups");
    let summary = summaries
        .iter()
        .find(|s| s.id == backup_id)
        .expect("summary present");
    assert_eq!(summary.row_count, 2);

    // Scenario C: restoring onto the now-columnless table fails.
    let err = engine
        .restore_backup(backup_id, None, Uuid::new_v4())
        .await
        .expect_err("no target column");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::TargetColumnNotFound { .. })
    ));

    // Re-add, then restore reproduces the data exactly.
    engine
        .add_column(ctx(form_id), &table, "old_phone", SemanticType::Phone)
        .await
        .expect("re-add");
    let restored = engine
        .restore_backup(backup_id, None, Uuid::new_v4())
        .await
        .expect("restore");
    assert_eq!(restored, 2);

    let sql = format!("SELECT old_phone FROM {} ORDER BY id", quote(&table));
    let rows: Vec<(Option<String>,)> = sqlx::query_as(&sql).fetch_all(&pool).await.expect("read");
    let back: Vec<_> = rows.into_iter().map(|(v,)| v.unwrap()).collect();
    assert_eq!(back, vec!["0812345678", "0898765432"]);

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn empty_table_backup_is_an_empty_snapshot() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let engine = engine(&pool);

    engine
        .add_column(ctx(Uuid::new_v4()), &table, "note", SemanticType::Paragraph)
        .await
        .expect("add");
    let backup = engine
        .backup_column(
            ctx(Uuid::new_v4()),
            &table,
            "note",
            formshift_core::BackupKind::Manual,
        )
        .await
        .expect("backup of empty table");
    assert!(backup.snapshot.is_empty());

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn scenario_d_rename_and_rename_back() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    engine
        .add_column(ctx(form_id), &table, "phone", SemanticType::Phone)
        .await
        .expect("add");
    engine
        .rename_column(ctx(form_id), &table, "phone", "phone_number")
        .await
        .expect("rename");
    engine
        .rename_column(ctx(form_id), &table, "phone_number", "phone")
        .await
        .expect("rename back");

    assert!(
        formshift_pg::introspect::column_exists(&pool, &table, "phone")
            .await
            .unwrap()
    );
    assert!(
        !formshift_pg::introspect::column_exists(&pool, &table, "phone_number")
            .await
            .unwrap()
    );

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn text_to_numeric_rejects_bad_values_converts_good_ones() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    engine
        .add_column(ctx(form_id), &table, "score", SemanticType::Paragraph)
        .await
        .expect("add");
    let insert = format!("INSERT INTO {} (score) VALUES ($1)", quote(&table));
    for value in ["42", "not a number"] {
        sqlx::query(&insert).bind(value).execute(&pool).await.expect("insert");
    }

    // Mixed values: rejected, no backup, no schema change.
    let before: Vec<formshift_pg::BackupSummary> = engine
        .backups()
        .list(form_id, true, 100, 0)
        .await
        .expect("list");
    let err = engine
        .migrate_column_type(
            ctx(form_id),
            &table,
            "score",
            SemanticType::Paragraph,
            SemanticType::Number,
        )
        .await
        .expect_err("must reject");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::IncompatibleTypeConversion { .. })
    ));
    let after = engine
        .backups()
        .list(form_id, true, 100, 0)
        .await
        .expect("list");
    assert_eq!(before.len(), after.len(), "no backup on rejection");
    assert_eq!(
        formshift_pg::introspect::column_type(&pool, &table, "score")
            .await
            .unwrap(),
        Some(formshift_core::ColumnType::Text)
    );

    // All-numeric values: converted, with a backup.
    let fix = format!("DELETE FROM {} WHERE score = 'not a number'", quote(&table));
    sqlx::query(&fix).execute(&pool).await.expect("delete");
    let record = engine
        .migrate_column_type(
            ctx(form_id),
            &table,
            "score",
            SemanticType::Paragraph,
            SemanticType::Number,
        )
        .await
        .expect("convert");
    assert!(record.success);
    assert!(record.backup_id.is_some());
    assert_eq!(
        formshift_pg::introspect::column_type(&pool, &table, "score")
            .await
            .unwrap(),
        Some(formshift_core::ColumnType::Numeric)
    );

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn history_reads_are_idempotent() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    engine
        .add_column(ctx(form_id), &table, "a", SemanticType::ShortText)
        .await
        .expect("add a");
    engine
        .add_column(ctx(form_id), &table, "b", SemanticType::Number)
        .await
        .expect("add b");

    let filter = HistoryFilter::latest(50);
    let first = engine.recorder().history(form_id, &filter).await.unwrap();
    let second = engine.recorder().history(form_id, &filter).await.unwrap();
    assert_eq!(first, second);

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn rollback_of_add_column_requires_field_gone() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    let record = engine
        .add_column(ctx(form_id), &table, "age", SemanticType::Number)
        .await
        .expect("add");

    let live = FakeCatalog {
        table: table.clone(),
        field_exists: true,
    };
    let err = engine
        .rollback(record.id, Uuid::new_v4(), &live)
        .await
        .expect_err("field still exists");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::RollbackIneligible { .. })
    ));

    let gone = FakeCatalog {
        table: table.clone(),
        field_exists: false,
    };
    let reversal = engine
        .rollback(record.id, Uuid::new_v4(), &gone)
        .await
        .expect("rollback");
    assert_eq!(reversal.reverses, Some(record.id));
    assert!(
        !formshift_pg::introspect::column_exists(&pool, &table, "age")
            .await
            .unwrap()
    );

    // Rolling back twice is rejected.
    let err = engine
        .rollback(record.id, Uuid::new_v4(), &gone)
        .await
        .expect_err("already reversed");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::RollbackIneligible { .. })
    ));

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn scenario_e_cleanup_dry_run_then_delete() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let engine = engine(&pool);

    engine
        .add_column(ctx(form_id), &table, "c", SemanticType::ShortText)
        .await
        .expect("add");
    let old = engine
        .backup_column(ctx(form_id), &table, "c", formshift_core::BackupKind::Manual)
        .await
        .expect("old backup");
    let fresh = engine
        .backup_column(ctx(form_id), &table, "c", formshift_core::BackupKind::Manual)
        .await
        .expect("fresh backup");

    // Age one backup past the retention window.
    sqlx::query(
        "UPDATE _formshift_backups SET created_at = now() - interval '91 days' WHERE id = $1",
    )
    .bind(old.id)
    .execute(&pool)
    .await
    .expect("age backup");

    let report = engine.backups().cleanup(90, true).await.expect("dry run");
    assert!(report.dry_run);
    assert_eq!(report.count, 1);
    assert_eq!(report.samples[0].id, old.id);

    let report = engine.backups().cleanup(90, false).await.expect("delete");
    assert_eq!(report.count, 1);
    assert!(engine.backups().get(old.id).await.unwrap().is_none());
    assert!(engine.backups().get(fresh.id).await.unwrap().is_some());

    let _ = engine.backups().delete(fresh.id).await;
    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn claim_hands_out_one_job_per_form_at_a_time() {
    let _queue = QUEUE_LOCK.lock().unwrap();
    let pool = pool().await;
    purge_queue(&pool).await;
    let form_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let store = PgJobStore::new(pool.clone());

    for name in ["first", "second"] {
        let intent = ChangeIntent {
            field_id: Uuid::new_v4(),
            form_id,
            subform_id: None,
            op: ChangeOp::AddField {
                column_name: name.to_string(),
                semantic_type: SemanticType::ShortText,
            },
        };
        store.enqueue(&intent, actor).await.expect("enqueue");
    }

    let claimed = store
        .claim_next()
        .await
        .expect("claim")
        .expect("a queued job must be claimable");
    assert_eq!(claimed.form_id, form_id);
    assert_eq!(claimed.state, formshift_pg::JobState::Running);
    assert_eq!(claimed.attempts, 1);
    let first_name = match &claimed.intent.op {
        ChangeOp::AddField { column_name, .. } => column_name.clone(),
        other => panic!("unexpected op {other:?}"),
    };
    assert_eq!(first_name, "first");

    // While the first job runs, the same form yields nothing.
    assert!(store.claim_next().await.expect("claim").is_none());

    store
        .mark_completed(claimed.id, Uuid::new_v4())
        .await
        .expect("complete");
    let next = store
        .claim_next()
        .await
        .expect("claim")
        .expect("second job claimable after the first completes");
    match &next.intent.op {
        ChangeOp::AddField { column_name, .. } => assert_eq!(column_name, "second"),
        other => panic!("unexpected op {other:?}"),
    }
    store
        .mark_completed(next.id, Uuid::new_v4())
        .await
        .expect("complete");
}

#[tokio::test]
async fn dropping_a_hand_altered_column_names_the_unmanaged_type() {
    let pool = pool().await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let engine = engine(&pool);

    let ddl = format!("ALTER TABLE {} ADD COLUMN blob BYTEA", quote(&table));
    sqlx::query(&ddl).execute(&pool).await.expect("hand add");

    let err = engine
        .drop_column(ctx(Uuid::new_v4()), &table, "blob", true)
        .await
        .expect_err("unmanaged type must be rejected");
    match err {
        EngineError::Domain(MigrationError::Validation(msg)) => {
            assert!(msg.contains("does not manage"), "message was {msg:?}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }

    // A genuinely missing column still reads as not found.
    let err = engine
        .drop_column(ctx(Uuid::new_v4()), &table, "absent", true)
        .await
        .expect_err("missing column");
    assert!(matches!(
        err,
        EngineError::Domain(MigrationError::ColumnNotFound { .. })
    ));

    drop_table(&pool, &table).await;
}

#[tokio::test]
async fn queue_executes_same_form_jobs_in_order() {
    let _queue = QUEUE_LOCK.lock().unwrap();
    let pool = pool().await;
    purge_queue(&pool).await;
    let table = scratch_table();
    create_dynamic_table(&pool, &table).await;
    let form_id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let store = PgJobStore::new(pool.clone());
    let columns = ["c1", "c2", "c3", "c4", "c5"];
    for name in columns {
        let intent = ChangeIntent {
            field_id: Uuid::new_v4(),
            form_id,
            subform_id: None,
            op: ChangeOp::AddField {
                column_name: name.to_string(),
                semantic_type: SemanticType::ShortText,
            },
        };
        store.enqueue(&intent, actor).await.expect("enqueue");
    }

    let catalog = Arc::new(FakeCatalog {
        table: table.clone(),
        field_exists: true,
    });
    let runtime = Arc::new(QueueRuntime::new(
        store.clone(),
        engine(&pool),
        catalog,
        RuntimeConfig {
            workers: 4,
            poll_interval: Duration::from_millis(50),
            ..RuntimeConfig::default()
        },
    ));
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&runtime).run(rx));

    // Wait for the queue to drain.
    for _ in 0..100 {
        let status = store.status(Some(form_id)).await.expect("status");
        if status.completed == columns.len() as i64 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tx.send(true).expect("shutdown");
    handle.await.expect("runtime join");

    let status = store.status(Some(form_id)).await.expect("status");
    assert_eq!(status.completed, columns.len() as i64);
    assert_eq!(status.failed, 0);

    // Records were written one at a time, in enqueue order.
    let recorder = formshift_pg::PgRecorder::new(pool.clone());
    let mut history = recorder
        .history(form_id, &HistoryFilter::latest(50))
        .await
        .expect("history");
    history.reverse(); // oldest first
    let executed: Vec<_> = history.iter().map(|r| r.column_name.clone()).collect();
    assert_eq!(executed, columns);
    for pair in history.windows(2) {
        assert!(pair[0].executed_at <= pair[1].executed_at);
    }

    drop_table(&pool, &table).await;
}
