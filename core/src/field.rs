//! Form field model.
//!
//! Fields are owned by the form-definition subsystem; the migration engine
//! only reads them. A field's `column_name` is the derived physical column
//! in the form's dynamic table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic type of a form field, as chosen in the form builder.
///
/// Unrecognised types deserialize to [`SemanticType::Unknown`] instead of
/// failing, and map to the most permissive physical type (`TEXT`), so a
/// newer form builder never breaks an older engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    ShortText,
    Paragraph,
    Email,
    Phone,
    Number,
    Url,
    FileRef,
    Date,
    Time,
    DateTime,
    Choice,
    MultiChoice,
    Rating,
    Slider,
    GeoPoint,
    Province,
    Category,
    #[serde(other)]
    Unknown,
}

impl SemanticType {
    /// All known variants, in declaration order. Used by table-driven tests
    /// and by the CLI when listing supported field types.
    pub const ALL: [SemanticType; 18] = [
        SemanticType::ShortText,
        SemanticType::Paragraph,
        SemanticType::Email,
        SemanticType::Phone,
        SemanticType::Number,
        SemanticType::Url,
        SemanticType::FileRef,
        SemanticType::Date,
        SemanticType::Time,
        SemanticType::DateTime,
        SemanticType::Choice,
        SemanticType::MultiChoice,
        SemanticType::Rating,
        SemanticType::Slider,
        SemanticType::GeoPoint,
        SemanticType::Province,
        SemanticType::Category,
        SemanticType::Unknown,
    ];
}

/// One field of a form (or of a sub-form), as persisted by the form editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: Uuid,
    pub form_id: Uuid,
    /// Set when the field belongs to a sub-form; sub-form fields live in the
    /// sub-form's own dynamic table, never the parent form's.
    #[serde(default)]
    pub subform_id: Option<Uuid>,
    pub semantic_type: SemanticType,
    /// Display label shown in the form builder.
    pub label: String,
    /// Derived snake_case physical column name.
    pub column_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_semantic_type_deserializes_to_fallback() {
        let ty: SemanticType = serde_json::from_str("\"hologram\"").unwrap();
        assert_eq!(ty, SemanticType::Unknown);
    }

    #[test]
    fn known_semantic_type_round_trips() {
        let json = serde_json::to_string(&SemanticType::MultiChoice).unwrap();
        assert_eq!(json, "\"multi_choice\"");
        let back: SemanticType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemanticType::MultiChoice);
    }
}
