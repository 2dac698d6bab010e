//! Forward and reverse DDL builders for single-column changes.
//!
//! Pure string generation: validation and quoting happen here, execution
//! happens in `formshift-pg`. Every builder validates its identifiers and
//! refuses to touch the fixed system columns of a dynamic table.

use crate::column::ColumnType;
use crate::error::MigrationError;

/// Columns every dynamic table carries regardless of its fields.
pub const SYSTEM_COLUMNS: [&str; 5] = [
    "id",
    "submission_id",
    "parent_row_id",
    "created_by",
    "created_at",
];

/// Validate a physical identifier: `^[a-z_][a-z0-9_]{0,62}$`.
pub fn validate_identifier(name: &str) -> Result<(), MigrationError> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid_first || !valid_rest || name.len() > 63 {
        return Err(MigrationError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validate a column identifier and reject system columns.
pub fn validate_column(name: &str) -> Result<(), MigrationError> {
    validate_identifier(name)?;
    if SYSTEM_COLUMNS.contains(&name) {
        return Err(MigrationError::SystemColumn(name.to_string()));
    }
    Ok(())
}

/// Double-quote a validated identifier.
///
/// Identifiers pass [`validate_identifier`] before they get here, so no
/// escaping is needed; quoting only protects against reserved words.
pub fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

pub fn add_column_sql(table: &str, column: &str, ty: ColumnType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote(table),
        quote(column),
        ty.sql()
    )
}

pub fn drop_column_sql(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", quote(table), quote(column))
}

pub fn rename_column_sql(table: &str, old: &str, new: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote(table),
        quote(old),
        quote(new)
    )
}

/// `ALTER ... TYPE ... USING <cast>`. The cast expression comes from the
/// conversion table and references the column by its quoted name.
pub fn change_type_sql(table: &str, column: &str, to: ColumnType, using: &str) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}",
        quote(table),
        quote(column),
        to.sql(),
        using
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("age").is_ok());
        assert!(validate_identifier("_hidden_2").is_ok());
        assert!(validate_identifier("Age").is_err());
        assert!(validate_identifier("1st").is_err());
        assert!(validate_identifier("drop table").is_err());
        assert!(validate_identifier("a\"; --").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn system_columns_are_protected() {
        for col in SYSTEM_COLUMNS {
            assert!(matches!(
                validate_column(col),
                Err(MigrationError::SystemColumn(_))
            ));
        }
        assert!(validate_column("age").is_ok());
    }

    #[test]
    fn add_column_statement() {
        assert_eq!(
            add_column_sql("t", "age", ColumnType::Numeric),
            "ALTER TABLE \"t\" ADD COLUMN \"age\" NUMERIC"
        );
    }

    #[test]
    fn drop_is_the_reverse_of_add() {
        assert_eq!(
            drop_column_sql("t", "age"),
            "ALTER TABLE \"t\" DROP COLUMN \"age\""
        );
    }

    #[test]
    fn rename_there_and_back_again() {
        let there = rename_column_sql("t", "phone", "phone_number");
        let back = rename_column_sql("t", "phone_number", "phone");
        assert_eq!(
            there,
            "ALTER TABLE \"t\" RENAME COLUMN \"phone\" TO \"phone_number\""
        );
        assert_eq!(
            back,
            "ALTER TABLE \"t\" RENAME COLUMN \"phone_number\" TO \"phone\""
        );
    }

    #[test]
    fn change_type_includes_using_cast() {
        assert_eq!(
            change_type_sql("t", "score", ColumnType::Numeric, "\"score\"::numeric"),
            "ALTER TABLE \"t\" ALTER COLUMN \"score\" TYPE NUMERIC USING \"score\"::numeric"
        );
    }
}
