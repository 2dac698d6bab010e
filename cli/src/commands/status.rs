//! Queue status.

use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::App;

pub async fn run(app: &App, actor: Uuid, form_id: Option<Uuid>) -> Result<()> {
    match form_id {
        Some(id) => println!("{} {}", "Queue status for form".cyan().bold(), id),
        None => println!("{}", "Global queue status".cyan().bold()),
    }

    let status = app.service.queue_status(actor, form_id).await?;

    println!("  waiting:   {}", status.waiting.to_string().yellow());
    println!("  active:    {}", status.active.to_string().cyan());
    println!("  completed: {}", status.completed.to_string().green());
    println!("  failed:    {}", status.failed.to_string().red());
    println!("  cancelled: {}", status.cancelled.to_string().dimmed());
    println!("  total:     {}", status.total());
    Ok(())
}
