//! The immutable migration audit record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of schema change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationKind {
    AddColumn,
    DropColumn,
    RenameColumn,
    ChangeType,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::AddColumn => "ADD_COLUMN",
            MigrationKind::DropColumn => "DROP_COLUMN",
            MigrationKind::RenameColumn => "RENAME_COLUMN",
            MigrationKind::ChangeType => "CHANGE_TYPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD_COLUMN" => Some(MigrationKind::AddColumn),
            "DROP_COLUMN" => Some(MigrationKind::DropColumn),
            "RENAME_COLUMN" => Some(MigrationKind::RenameColumn),
            "CHANGE_TYPE" => Some(MigrationKind::ChangeType),
            _ => None,
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a record cannot be rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackIneligibility {
    /// The migration failed; there is nothing to undo.
    Failed,
    /// No reverse SQL was recorded for this operation.
    NoRollbackSql,
    /// Rolling back an ADD_COLUMN while the field still exists would orphan
    /// a live field from its backing column. Intentional restriction.
    FieldStillExists,
    /// A later successful record already reversed this one.
    AlreadyReversed,
}

impl fmt::Display for RollbackIneligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RollbackIneligibility::Failed => "the migration did not succeed",
            RollbackIneligibility::NoRollbackSql => "no reverse statement was recorded",
            RollbackIneligibility::FieldStillExists => {
                "the originating field still exists; delete the field first"
            }
            RollbackIneligibility::AlreadyReversed => "it has already been rolled back",
        };
        f.write_str(msg)
    }
}

/// One executed (or attempted) schema change. Created once, never mutated,
/// never deleted; a rollback creates a new record pointing back via
/// [`MigrationRecord::reverses`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: Uuid,
    /// Nulled when the originating field is deleted; history outlives fields.
    pub field_id: Option<Uuid>,
    pub form_id: Uuid,
    pub kind: MigrationKind,
    pub table_name: String,
    pub column_name: String,
    /// What changed away: e.g. `{"old_type": ...}` or `{"old_name": ...}`.
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    /// The backup taken for this migration, if any.
    pub backup_id: Option<Uuid>,
    pub executed_by: Uuid,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    /// Literal reverse statement. Null when the operation failed or cannot
    /// be undone.
    pub rollback_sql: Option<String>,
    /// Set on a rollback record: the record it undoes.
    pub reverses: Option<Uuid>,
}

impl MigrationRecord {
    /// Rollback eligibility, given whether the originating field still
    /// exists and whether a later record already reversed this one.
    ///
    /// Eligible iff the migration succeeded, reverse SQL was recorded, it
    /// has not been reversed, and (for ADD_COLUMN) the field is gone.
    pub fn rollback_eligibility(
        &self,
        field_still_exists: bool,
        already_reversed: bool,
    ) -> Result<(), RollbackIneligibility> {
        if !self.success {
            return Err(RollbackIneligibility::Failed);
        }
        if self.rollback_sql.is_none() {
            return Err(RollbackIneligibility::NoRollbackSql);
        }
        if already_reversed {
            return Err(RollbackIneligibility::AlreadyReversed);
        }
        if self.kind == MigrationKind::AddColumn && field_still_exists {
            return Err(RollbackIneligibility::FieldStillExists);
        }
        Ok(())
    }

    pub fn can_roll_back(&self, field_still_exists: bool, already_reversed: bool) -> bool {
        self.rollback_eligibility(field_still_exists, already_reversed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn record(kind: MigrationKind, success: bool, rollback_sql: Option<&str>) -> MigrationRecord {
        MigrationRecord {
            id: Uuid::new_v4(),
            field_id: Some(Uuid::new_v4()),
            form_id: Uuid::new_v4(),
            kind,
            table_name: "t".to_string(),
            column_name: "c".to_string(),
            old_value: None,
            new_value: None,
            backup_id: None,
            executed_by: Uuid::new_v4(),
            executed_at: Utc::now(),
            success,
            error: None,
            rollback_sql: rollback_sql.map(str::to_string),
            reverses: None,
        }
    }

    #[test]
    fn failed_record_is_never_eligible() {
        let r = record(MigrationKind::DropColumn, false, None);
        assert_eq!(
            r.rollback_eligibility(false, false),
            Err(RollbackIneligibility::Failed)
        );
    }

    #[test]
    fn add_column_needs_the_field_gone() {
        let r = record(
            MigrationKind::AddColumn,
            true,
            Some("ALTER TABLE \"t\" DROP COLUMN \"c\""),
        );
        assert_eq!(
            r.rollback_eligibility(true, false),
            Err(RollbackIneligibility::FieldStillExists)
        );
        assert!(r.can_roll_back(false, false));
    }

    #[test]
    fn double_rollback_is_rejected() {
        let r = record(
            MigrationKind::RenameColumn,
            true,
            Some("ALTER TABLE \"t\" RENAME COLUMN \"b\" TO \"a\""),
        );
        assert_eq!(
            r.rollback_eligibility(true, true),
            Err(RollbackIneligibility::AlreadyReversed)
        );
    }

    fn arb_kind() -> impl Strategy<Value = MigrationKind> {
        prop_oneof![
            Just(MigrationKind::AddColumn),
            Just(MigrationKind::DropColumn),
            Just(MigrationKind::RenameColumn),
            Just(MigrationKind::ChangeType),
        ]
    }

    proptest! {
        #[test]
        fn eligibility_matches_the_invariant(
            kind in arb_kind(),
            success in any::<bool>(),
            has_sql in any::<bool>(),
            field_exists in any::<bool>(),
            reversed in any::<bool>(),
        ) {
            let r = record(kind, success, has_sql.then_some("ALTER TABLE \"t\" DROP COLUMN \"c\""));
            let expected = success
                && has_sql
                && !reversed
                && !(kind == MigrationKind::AddColumn && field_exists);
            prop_assert_eq!(r.can_roll_back(field_exists, reversed), expected);
        }
    }
}
