//! Retention Sweeper: scheduled deletion of expired backups.

use std::time::Duration;

use tokio::sync::watch;

use crate::backups::PgBackupStore;

/// Tuning knobs for the sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between passes. Daily in production; short in tests.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Deletes backups past their retention deadline on a fixed interval.
///
/// Best-effort: a failed pass is logged and retried on the next tick, never
/// escalated. The sweep itself is one bounded DELETE.
pub struct RetentionSweeper {
    backups: PgBackupStore,
    config: SweeperConfig,
}

impl RetentionSweeper {
    pub fn new(backups: PgBackupStore, config: SweeperConfig) -> Self {
        Self { backups, config }
    }

    /// Run until `shutdown` flips to true. Sweeps once immediately, then on
    /// every interval tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("retention sweeper stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn sweep_once(&self) {
        match self.backups.delete_expired().await {
            Ok(0) => tracing::debug!("retention sweep: nothing expired"),
            Ok(n) => tracing::info!(deleted = n, "retention sweep deleted expired backups"),
            Err(e) => tracing::warn!(error = %e, "retention sweep failed, will retry next tick"),
        }
    }
}
