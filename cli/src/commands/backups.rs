//! Backup listings and restore.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use formshift_pg::BackupSummary;

use crate::App;

#[derive(Subcommand)]
pub enum BackupsCommand {
    /// List a form's backups
    List {
        form_id: Uuid,
        /// Include backups past their retention deadline
        #[arg(long)]
        include_expired: bool,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Backups whose retention deadline falls within the next N days
    Expiring {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Re-apply a backup's data onto its column
    Restore {
        backup_id: Uuid,
        /// Target column; defaults to the column the backup was taken from
        #[arg(long)]
        column: Option<String>,
    },
}

pub async fn run(app: &App, actor: Uuid, cmd: BackupsCommand) -> Result<()> {
    match cmd {
        BackupsCommand::List {
            form_id,
            include_expired,
            limit,
            offset,
        } => {
            let backups = app
                .service
                .list_backups(actor, form_id, include_expired, limit, offset)
                .await?;
            println!("{} {}", "Backups for form".cyan().bold(), form_id);
            print_summaries(&backups);
        }
        BackupsCommand::Expiring { days } => {
            let backups = app.service.backups_expiring_within(actor, days).await?;
            println!(
                "{}",
                format!("Backups expiring within {days} day(s)").cyan().bold()
            );
            print_summaries(&backups);
        }
        BackupsCommand::Restore { backup_id, column } => {
            println!("{} {}", "Restoring backup".cyan().bold(), backup_id);
            let restored = app
                .service
                .restore_backup(actor, backup_id, column.as_deref())
                .await?;
            println!(
                "{} {} row(s) restored",
                "✓".green().bold(),
                restored.to_string().cyan()
            );
        }
    }
    Ok(())
}

fn print_summaries(backups: &[BackupSummary]) {
    if backups.is_empty() {
        println!("  {}", "no backups".dimmed());
        return;
    }
    for backup in backups {
        println!(
            "  {} {}.{} {} {} rows, retained until {}",
            backup.id.to_string().dimmed(),
            backup.table_name,
            backup.column_name.cyan(),
            backup.kind.yellow(),
            backup.row_count,
            backup.retain_until.format("%Y-%m-%d").to_string().yellow()
        );
    }
}
