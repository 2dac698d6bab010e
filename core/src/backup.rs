//! Point-in-time column snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retention window for new backups.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Why a backup was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Taken automatically before a DROP_COLUMN.
    PreDrop,
    /// Taken automatically before a CHANGE_TYPE.
    PreTypeChange,
    /// Requested explicitly by an operator.
    Manual,
    /// Taken by an automated policy; first in line for retention cleanup.
    Auto,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::PreDrop => "pre_drop",
            BackupKind::PreTypeChange => "pre_type_change",
            BackupKind::Manual => "manual",
            BackupKind::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pre_drop" => Some(BackupKind::PreDrop),
            "pre_type_change" => Some(BackupKind::PreTypeChange),
            "manual" => Some(BackupKind::Manual),
            "auto" => Some(BackupKind::Auto),
            _ => None,
        }
    }
}

/// One `(row id, value)` pair of a snapshot. Values are captured as text
/// casts so the snapshot is independent of the column's type at the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub row_id: i64,
    pub value: Option<String>,
}

/// A point-in-time capture of one column's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBackup {
    pub id: Uuid,
    /// Nulled when the originating field is deleted.
    pub field_id: Option<Uuid>,
    pub form_id: Uuid,
    pub table_name: String,
    pub column_name: String,
    /// Ordered by row id. Empty for an empty table; that is not an error.
    pub snapshot: Vec<SnapshotEntry>,
    pub kind: BackupKind,
    /// Past this instant the sweeper may delete the backup.
    pub retain_until: DateTime<Utc>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl DataBackup {
    /// Default retention deadline for a backup created at `created_at`.
    pub fn default_retain_until(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(DEFAULT_RETENTION_DAYS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.retain_until < now
    }

    pub fn row_count(&self) -> usize {
        self.snapshot.len()
    }
}
