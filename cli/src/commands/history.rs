//! Migration history for a form.

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use formshift_pg::HistoryFilter;

use crate::App;

pub async fn run(
    app: &App,
    actor: Uuid,
    form_id: Uuid,
    success: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<()> {
    let filter = HistoryFilter {
        success,
        limit,
        offset,
    };
    let records = app.service.history(actor, form_id, filter).await?;

    println!(
        "{} {}",
        "Migration history for form".cyan().bold(),
        form_id
    );
    if records.is_empty() {
        println!("  {}", "no migrations recorded".dimmed());
        return Ok(());
    }

    for record in &records {
        let mark = if record.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {} {} {} {}.{} {}",
            mark,
            record.executed_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            record.kind.as_str().yellow(),
            record.table_name,
            record.column_name.cyan(),
            record.id.to_string().dimmed()
        );
        if let Some(error) = &record.error {
            println!("      {} {}", "error:".red(), error);
        }
        if let Some(backup_id) = record.backup_id {
            println!("      {} {}", "backup:".dimmed(), backup_id);
        }
        if let Some(reverses) = record.reverses {
            println!("      {} {}", "rolls back:".dimmed(), reverses);
        }
    }
    println!();
    println!(
        "  {} record(s), offset {}",
        records.len().to_string().cyan(),
        offset
    );
    Ok(())
}
