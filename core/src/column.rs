//! Physical column types and the semantic-to-physical mapper.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::field::SemanticType;

/// PostgreSQL column type used by dynamic tables.
///
/// Closed set: the mapper below only ever produces these, and
/// [`ColumnType::from_information_schema`] parses them back from
/// `information_schema.columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    VarChar(u32),
    Text,
    Numeric,
    Integer,
    Date,
    Time,
    TimestampTz,
    Jsonb,
    Point,
}

impl ColumnType {
    /// SQL type name as written in DDL.
    pub fn sql(&self) -> String {
        match self {
            ColumnType::VarChar(n) => format!("VARCHAR({n})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Numeric => "NUMERIC".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
            ColumnType::Point => "POINT".to_string(),
        }
    }

    /// Parse a type back from `information_schema.columns`
    /// (`udt_name` plus `character_maximum_length`).
    ///
    /// Returns `None` for types the engine never generates (a dynamic table
    /// touched by hand); callers treat that as an unsupported conversion
    /// source rather than guessing.
    pub fn from_information_schema(udt_name: &str, char_max_length: Option<i32>) -> Option<Self> {
        match udt_name {
            "varchar" => {
                let n = char_max_length.and_then(|n| u32::try_from(n).ok())?;
                Some(ColumnType::VarChar(n))
            }
            "text" => Some(ColumnType::Text),
            "numeric" => Some(ColumnType::Numeric),
            "int4" => Some(ColumnType::Integer),
            "date" => Some(ColumnType::Date),
            "time" => Some(ColumnType::Time),
            "timestamptz" => Some(ColumnType::TimestampTz),
            "jsonb" => Some(ColumnType::Jsonb),
            "point" => Some(ColumnType::Point),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

impl SemanticType {
    /// Map a semantic field type to its physical column type.
    ///
    /// Total and deterministic. Unknown future types get `TEXT`, the most
    /// permissive choice, so forward compatibility never costs data.
    pub fn column_type(&self) -> ColumnType {
        match self {
            SemanticType::ShortText | SemanticType::Email | SemanticType::Choice => {
                ColumnType::VarChar(255)
            }
            SemanticType::Phone => ColumnType::VarChar(20),
            SemanticType::Province | SemanticType::Category => ColumnType::VarChar(100),
            SemanticType::Paragraph
            | SemanticType::Url
            | SemanticType::FileRef
            | SemanticType::Unknown => ColumnType::Text,
            SemanticType::Number => ColumnType::Numeric,
            SemanticType::Rating | SemanticType::Slider => ColumnType::Integer,
            SemanticType::Date => ColumnType::Date,
            SemanticType::Time => ColumnType::Time,
            SemanticType::DateTime => ColumnType::TimestampTz,
            SemanticType::MultiChoice => ColumnType::Jsonb,
            SemanticType::GeoPoint => ColumnType::Point,
        }
    }
}
