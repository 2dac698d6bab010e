//! Age-based backup cleanup.

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::App;

pub async fn run(app: &App, actor: Uuid, retention_days: i64, dry_run: bool) -> Result<()> {
    let label = if dry_run { " (dry-run)" } else { "" };
    println!(
        "{}",
        format!("Cleaning up backups older than {retention_days} day(s){label}")
            .cyan()
            .bold()
    );

    let report = app.service.cleanup(actor, retention_days, dry_run).await?;

    if report.dry_run {
        println!(
            "  {} backup(s) {} be deleted",
            report.count.to_string().yellow(),
            "would".yellow()
        );
    } else {
        println!(
            "{} {} backup(s) deleted",
            "✓".green().bold(),
            report.count.to_string().cyan()
        );
    }

    if !report.samples.is_empty() {
        println!("  {}", "oldest affected:".dimmed());
        for sample in &report.samples {
            println!(
                "    {} {}.{} created {}",
                sample.id.to_string().dimmed(),
                sample.table_name,
                sample.column_name.cyan(),
                sample.created_at.format("%Y-%m-%d").to_string().yellow()
            );
        }
    }
    Ok(())
}
