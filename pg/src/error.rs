//! Engine-level error type.

use thiserror::Error;

use formshift_core::{LookupError, MigrationError};

/// Everything a database-facing operation can fail with.
///
/// Domain errors are the interesting ones: they roll the operation's
/// transaction back and get written to the audit log as a failed record.
/// The rest are infrastructure failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] MigrationError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("migration timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl EngineError {
    /// Domain errors are recorded in the audit log and reported to the user
    /// with their own message; infrastructure errors are logged and retried.
    pub fn is_domain(&self) -> bool {
        matches!(self, EngineError::Domain(_))
    }
}
