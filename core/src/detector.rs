//! Change detection: diff two field lists into typed change intents.
//!
//! Runs synchronously in the form-save request; the intents it emits are
//! what the queue persists and the engine executes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::field::{FieldDef, SemanticType};

/// One field-level difference between two versions of a form's field list.
///
/// Closed sum type: the engine matches exhaustively, so adding a kind is a
/// compile-time checklist, not a string switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    AddField {
        column_name: String,
        semantic_type: SemanticType,
    },
    DeleteField {
        column_name: String,
    },
    RenameField {
        old_name: String,
        new_name: String,
    },
    ChangeType {
        column_name: String,
        old_type: SemanticType,
        new_type: SemanticType,
    },
}

impl ChangeOp {
    /// Short name used in logs and queue listings.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeOp::AddField { .. } => "ADD_FIELD",
            ChangeOp::DeleteField { .. } => "DELETE_FIELD",
            ChangeOp::RenameField { .. } => "RENAME_FIELD",
            ChangeOp::ChangeType { .. } => "CHANGE_TYPE",
        }
    }
}

/// A [`ChangeOp`] scoped to the table it targets. Sub-form intents carry the
/// sub-form id so they resolve to the sub-form's own dynamic table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeIntent {
    pub field_id: Uuid,
    pub form_id: Uuid,
    #[serde(default)]
    pub subform_id: Option<Uuid>,
    pub op: ChangeOp,
}

/// Diff the previously persisted field list against the newly submitted one.
///
/// Fields are matched by stable id and diffed per `(form, sub-form)` scope.
/// Within a scope, deletions come first in old-list order (freeing column
/// names for reuse), then additions and modifications in new-list order.
/// When one field was both renamed and retyped, the rename is emitted first
/// so the type change references the new column name.
pub fn diff_fields(old: &[FieldDef], new: &[FieldDef]) -> Vec<ChangeIntent> {
    let mut intents = Vec::new();

    for old_field in old {
        if !new.iter().any(|f| f.id == old_field.id) {
            intents.push(ChangeIntent {
                field_id: old_field.id,
                form_id: old_field.form_id,
                subform_id: old_field.subform_id,
                op: ChangeOp::DeleteField {
                    column_name: old_field.column_name.clone(),
                },
            });
        }
    }

    for new_field in new {
        match old.iter().find(|f| f.id == new_field.id) {
            None => intents.push(ChangeIntent {
                field_id: new_field.id,
                form_id: new_field.form_id,
                subform_id: new_field.subform_id,
                op: ChangeOp::AddField {
                    column_name: new_field.column_name.clone(),
                    semantic_type: new_field.semantic_type,
                },
            }),
            Some(old_field) => {
                if old_field.column_name != new_field.column_name {
                    intents.push(ChangeIntent {
                        field_id: new_field.id,
                        form_id: new_field.form_id,
                        subform_id: new_field.subform_id,
                        op: ChangeOp::RenameField {
                            old_name: old_field.column_name.clone(),
                            new_name: new_field.column_name.clone(),
                        },
                    });
                }
                if old_field.semantic_type != new_field.semantic_type {
                    intents.push(ChangeIntent {
                        field_id: new_field.id,
                        form_id: new_field.form_id,
                        subform_id: new_field.subform_id,
                        op: ChangeOp::ChangeType {
                            // After a simultaneous rename the type change
                            // targets the new name.
                            column_name: new_field.column_name.clone(),
                            old_type: old_field.semantic_type,
                            new_type: new_field.semantic_type,
                        },
                    });
                }
            }
        }
    }

    intents
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn field(id: u128, form: u128, name: &str, ty: SemanticType) -> FieldDef {
        FieldDef {
            id: Uuid::from_u128(id),
            form_id: Uuid::from_u128(form),
            subform_id: None,
            semantic_type: ty,
            label: name.to_string(),
            column_name: name.to_string(),
        }
    }

    #[test]
    fn identical_lists_produce_no_intents() {
        let fields = vec![field(1, 10, "age", SemanticType::Number)];
        assert_eq!(diff_fields(&fields, &fields), vec![]);
    }

    #[test]
    fn added_and_removed_fields() {
        let old = vec![field(1, 10, "age", SemanticType::Number)];
        let new = vec![field(2, 10, "email", SemanticType::Email)];
        let intents = diff_fields(&old, &new);
        assert_eq!(intents.len(), 2);
        assert!(matches!(intents[0].op, ChangeOp::DeleteField { .. }));
        assert!(matches!(intents[1].op, ChangeOp::AddField { .. }));
    }

    #[test]
    fn rename_is_detected_by_stable_id() {
        let old = vec![field(1, 10, "phone", SemanticType::Phone)];
        let mut renamed = field(1, 10, "phone_number", SemanticType::Phone);
        renamed.label = "Phone number".to_string();
        let intents = diff_fields(&old, &[renamed]);
        assert_eq!(intents.len(), 1);
        assert_eq!(
            intents[0].op,
            ChangeOp::RenameField {
                old_name: "phone".to_string(),
                new_name: "phone_number".to_string(),
            }
        );
    }

    #[test]
    fn rename_plus_type_change_emits_both_rename_first() {
        let old = vec![field(1, 10, "phone", SemanticType::Phone)];
        let new = vec![field(1, 10, "contact", SemanticType::ShortText)];
        let intents = diff_fields(&old, &new);
        assert_eq!(intents.len(), 2);
        assert_eq!(
            intents[0].op,
            ChangeOp::RenameField {
                old_name: "phone".to_string(),
                new_name: "contact".to_string(),
            }
        );
        assert_eq!(
            intents[1].op,
            ChangeOp::ChangeType {
                column_name: "contact".to_string(),
                old_type: SemanticType::Phone,
                new_type: SemanticType::ShortText,
            }
        );
    }

    #[test]
    fn subform_fields_keep_their_own_scope() {
        let sub = Uuid::from_u128(99);
        let mut old_sub = field(2, 10, "note", SemanticType::Paragraph);
        old_sub.subform_id = Some(sub);
        let old = vec![field(1, 10, "age", SemanticType::Number), old_sub];
        let new = vec![field(1, 10, "age", SemanticType::Number)];
        let intents = diff_fields(&old, &new);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].subform_id, Some(sub));
        assert!(matches!(intents[0].op, ChangeOp::DeleteField { .. }));
    }

    #[test]
    fn intent_serializes_with_screaming_kind_tag() {
        let intent = ChangeIntent {
            field_id: Uuid::from_u128(1),
            form_id: Uuid::from_u128(10),
            subform_id: None,
            op: ChangeOp::AddField {
                column_name: "age".to_string(),
                semantic_type: SemanticType::Number,
            },
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["op"]["kind"], "ADD_FIELD");
        let back: ChangeIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }
}
