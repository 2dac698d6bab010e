//! Enqueue migrations for asynchronous execution.

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::commands::load_and_diff;
use crate::App;

pub async fn run(app: &App, actor: Uuid, old_path: &str, new_path: &str) -> Result<()> {
    let intents = load_and_diff(old_path, new_path)?;
    if intents.is_empty() {
        println!("{}", "No migrations to enqueue.".green());
        return Ok(());
    }

    println!(
        "{} {} migration(s) to enqueue",
        "Found:".cyan(),
        intents.len()
    );

    let handles = app.service.enqueue(actor, &intents).await?;
    for (intent, handle) in intents.iter().zip(&handles) {
        println!(
            "  {} {} {} {}",
            "→".cyan(),
            intent.op.kind().yellow(),
            handle.job_id,
            format!("(position {})", handle.queue_position).dimmed()
        );
    }

    println!();
    println!(
        "{} Jobs queued. A running {} will pick them up.",
        "✓".green().bold(),
        "formshift worker".cyan()
    );
    Ok(())
}
