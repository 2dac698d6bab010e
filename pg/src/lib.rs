//! PostgreSQL side of the formshift migration engine.
//!
//! Builds on the pure domain layer in `formshift-core`:
//!
//! - [`meta`]: pool construction and meta-table bootstrap
//! - [`introspect`]: live `information_schema` reads (never cached)
//! - [`recorder`]: the append-only audit log store
//! - [`backups`]: the column-snapshot store
//! - [`engine`]: the transactional migration primitives
//! - [`queue`]: the durable, per-form-serialized job queue
//! - [`sweeper`]: scheduled retention cleanup
//! - [`service`]: the role-gated facade consumed by the API layer
//! - [`platform`]: Postgres adapters for the platform seams
//!
//! Integration tests that need a live database are gated behind the
//! `pg-tests` feature and read `DATABASE_URL`.

pub mod backups;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod meta;
pub mod platform;
pub mod queue;
pub mod recorder;
pub mod service;
pub mod sweeper;

pub use backups::{BackupSummary, CleanupReport, PgBackupStore};
pub use engine::{EngineConfig, MigrationCtx, MigrationEngine};
pub use error::EngineError;
pub use meta::{connect, ensure_meta_tables};
pub use platform::{PgFieldCatalog, PgRoleProvider};
pub use queue::{JobHandle, JobState, PgJobStore, QueueRuntime, QueueStatus, RuntimeConfig};
pub use recorder::{HistoryFilter, PgRecorder};
pub use service::MigrationService;
pub use sweeper::{RetentionSweeper, SweeperConfig};
