//! Dry-run previews.

use serde::{Deserialize, Serialize};

/// What a migration would do, without doing it.
///
/// Built from SELECT-only introspection so callers can show a confirmation
/// dialog before enqueueing the real thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPreview {
    /// The statement that would run. Empty for a no-op type change.
    pub sql: String,
    /// The reverse statement that would be recorded, if the operation is
    /// undoable.
    pub rollback_sql: Option<String>,
    /// False when the intent would be rejected (duplicate column, missing
    /// column, unsupported conversion).
    pub valid: bool,
    pub warnings: Vec<String>,
    /// `COUNT(*)` of the target table at preview time.
    pub estimated_rows: i64,
    /// Whether executing would take a column backup first.
    pub requires_backup: bool,
}

impl MigrationPreview {
    pub fn rejected(warning: impl Into<String>) -> Self {
        Self {
            sql: String::new(),
            rollback_sql: None,
            valid: false,
            warnings: vec![warning.into()],
            estimated_rows: 0,
            requires_backup: false,
        }
    }
}
