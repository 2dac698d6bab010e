//! Domain error taxonomy for migration operations.

use thiserror::Error;

use crate::record::RollbackIneligibility;

/// Errors a migration operation can reject with.
///
/// Every variant carries enough context for a user-facing message that says
/// what actually went wrong, not a generic "migration failed". Domain errors
/// raised mid-operation roll the owning transaction back and are written to
/// the audit log as a failed record.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Malformed intent, rejected before any transaction opens.
    #[error("invalid migration request: {0}")]
    Validation(String),

    /// Identifier does not match `^[a-z_][a-z0-9_]{{0,62}}$`.
    #[error("invalid identifier {0:?}: must be snake_case, start with a letter or underscore, and be at most 63 characters")]
    InvalidIdentifier(String),

    /// The fixed system columns of a dynamic table cannot be migrated.
    #[error("column {0:?} is a system column and cannot be modified")]
    SystemColumn(String),

    #[error("column {column:?} already exists on table {table:?}")]
    DuplicateColumn { table: String, column: String },

    #[error("column {column:?} does not exist on table {table:?}")]
    ColumnNotFound { table: String, column: String },

    /// The conversion is unsupported, or existing values failed validation.
    #[error("cannot convert column {column:?} from {from} to {to}: {reason}")]
    IncompatibleTypeConversion {
        column: String,
        from: String,
        to: String,
        reason: String,
    },

    #[error("backup {0} not found")]
    BackupNotFound(uuid::Uuid),

    #[error("backup {0} is past its retention deadline and can no longer be restored")]
    BackupExpired(uuid::Uuid),

    /// Restore target column missing; the column must be re-added first.
    #[error("target column {column:?} does not exist on table {table:?}; re-add the column before restoring data")]
    TargetColumnNotFound { table: String, column: String },

    #[error("migration {record_id} cannot be rolled back: {reason}")]
    RollbackIneligible {
        record_id: uuid::Uuid,
        reason: RollbackIneligibility,
    },

    /// The actor lacks the role this operation requires.
    #[error("actor {actor} is not permitted to {action}")]
    Forbidden { actor: uuid::Uuid, action: String },
}
