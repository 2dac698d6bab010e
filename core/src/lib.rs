//! Domain layer for the formshift dynamic-table migration engine.
//!
//! Forms own a generated ("dynamic") PostgreSQL table whose columns map 1:1
//! to the form's fields. When the field list changes, the table has to follow
//! without losing data. This crate holds everything about that problem that
//! does not touch a database connection:
//!
//! - [`field`]: the field model and the 17 semantic field types
//! - [`column`]: physical column types and the semantic-to-physical mapper
//! - [`convert`]: the conservative type-conversion table
//! - [`ddl`]: forward and reverse `ALTER TABLE` statement builders
//! - [`detector`]: diffing two field lists into typed change intents
//! - [`record`]: the immutable migration audit record and rollback eligibility
//! - [`backup`]: point-in-time column snapshots with retention deadlines
//! - [`plan`]: dry-run previews
//! - [`catalog`]: traits the host platform implements (field lookup, roles)
//!
//! The database-facing engine, queue and stores live in `formshift-pg`.

pub mod backup;
pub mod catalog;
pub mod column;
pub mod convert;
pub mod ddl;
pub mod detector;
pub mod error;
pub mod field;
pub mod plan;
pub mod record;

pub use backup::{BackupKind, DataBackup, SnapshotEntry, DEFAULT_RETENTION_DAYS};
pub use catalog::{ActorRoles, FieldCatalog, LookupError, RoleProvider};
pub use column::ColumnType;
pub use convert::{conversion, Conversion};
pub use detector::{diff_fields, ChangeIntent, ChangeOp};
pub use error::MigrationError;
pub use field::{FieldDef, SemanticType};
pub use plan::MigrationPreview;
pub use record::{MigrationKind, MigrationRecord, RollbackIneligibility};
