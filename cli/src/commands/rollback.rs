//! Roll back an eligible migration.

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::App;

pub async fn run(app: &App, actor: Uuid, record_id: Uuid) -> Result<()> {
    println!("{} {}", "Rolling back migration".cyan().bold(), record_id);

    let reversal = app.service.rollback(actor, record_id).await?;

    println!(
        "{} Rolled back as {} ({} on {}.{})",
        "✓".green().bold(),
        reversal.id,
        reversal.kind.as_str().yellow(),
        reversal.table_name,
        reversal.column_name.cyan()
    );
    println!(
        "  {}",
        "Data is not restored automatically; use 'formshift backups restore' if needed.".dimmed()
    );
    Ok(())
}
