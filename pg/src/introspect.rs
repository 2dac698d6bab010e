//! Live-table introspection.
//!
//! The dynamic table is externally owned mutable state: no column layout is
//! ever cached across calls. Every operation re-reads
//! `information_schema.columns` through here, inside its own transaction
//! when one is open, so the introspected type is authoritative for the
//! reverse SQL it records.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use formshift_core::ddl::quote;
use formshift_core::ColumnType;

/// Current physical type of a column, or `None` if the column is absent.
///
/// A hand-altered column with a type the engine never generates also
/// comes back as `None`; callers that need to tell the two apart use
/// [`column_exists`].
pub async fn column_type<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
    column: &str,
) -> Result<Option<ColumnType>, sqlx::Error> {
    let row: Option<PgRow> = sqlx::query(
        "SELECT udt_name, character_maximum_length
         FROM information_schema.columns
         WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_optional(executor)
    .await?;

    Ok(row.and_then(|r| {
        let udt: String = r.get("udt_name");
        let len: Option<i32> = r.get("character_maximum_length");
        ColumnType::from_information_schema(&udt, len)
    }))
}

pub async fn column_exists<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
    column: &str,
) -> Result<bool, sqlx::Error> {
    let row: PgRow = sqlx::query(
        "SELECT EXISTS (
             SELECT 1 FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2
         ) AS present",
    )
    .bind(table)
    .bind(column)
    .fetch_one(executor)
    .await?;
    Ok(row.get::<bool, _>("present"))
}

pub async fn table_exists<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
) -> Result<bool, sqlx::Error> {
    let row: PgRow = sqlx::query(
        "SELECT EXISTS (
             SELECT 1 FROM information_schema.tables
             WHERE table_schema = 'public' AND table_name = $1
         ) AS present",
    )
    .bind(table)
    .fetch_one(executor)
    .await?;
    Ok(row.get::<bool, _>("present"))
}

/// `COUNT(*)` of a dynamic table. Identifiers are validated by callers
/// before they reach the interpolated query.
pub async fn row_count<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) AS n FROM {}", quote(table));
    let row: PgRow = sqlx::query(&sql).fetch_one(executor).await?;
    Ok(row.get::<i64, _>("n"))
}

/// Count rows matching a violation predicate from the conversion table.
pub async fn violation_count<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &str,
    violation: &str,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) AS n FROM {} WHERE {}", quote(table), violation);
    let row: PgRow = sqlx::query(&sql).fetch_one(executor).await?;
    Ok(row.get::<i64, _>("n"))
}
