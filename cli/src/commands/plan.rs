//! Migration plan (dry-run).

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::commands::load_and_diff;
use crate::App;

pub async fn run(app: &App, actor: Uuid, old_path: &str, new_path: &str) -> Result<()> {
    println!("{}", "Migration Plan (dry-run)".cyan().bold());
    println!("  {} → {}", old_path.yellow(), new_path.yellow());
    println!();

    let intents = load_and_diff(old_path, new_path)?;
    if intents.is_empty() {
        println!("{}", "✓ No migrations needed - field lists are identical".green());
        return Ok(());
    }

    let previews = app.service.preview(actor, &intents).await?;

    for (i, (intent, preview)) in intents.iter().zip(&previews).enumerate() {
        let mark = if preview.valid {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "{} {} {} {}",
            format!("[{}/{}]", i + 1, intents.len()).cyan(),
            mark,
            intent.op.kind().yellow(),
            format!("form {}", intent.form_id).dimmed()
        );
        if preview.sql.is_empty() {
            println!("    {}", "(no DDL)".dimmed());
        } else {
            println!("    {}", preview.sql.cyan());
        }
        if let Some(rollback) = &preview.rollback_sql {
            println!("    {} {}", "undo:".dimmed(), rollback.yellow());
        }
        if preview.requires_backup {
            println!(
                "    {} ~{} row(s) will be snapshotted first",
                "backup:".dimmed(),
                preview.estimated_rows
            );
        }
        for warning in &preview.warnings {
            println!("    {} {}", "⚠".yellow(), warning);
        }
    }

    let invalid = previews.iter().filter(|p| !p.valid).count();
    println!();
    if invalid > 0 {
        println!(
            "{}",
            format!("{invalid} migration(s) would be rejected - fix the field lists first").red()
        );
    } else {
        println!(
            "{} Run {} to apply",
            "✓".green(),
            "formshift enqueue".cyan()
        );
    }
    Ok(())
}
