//! Background synchronization loop.
//!
//! Each pass syncs every feed in turn and then refreshes site icons. The next
//! pass is armed only after the current one has finished, so a slow pass
//! delays the next one instead of overlapping it.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::{FeedEngine, FeedPassReport};
use crate::icon::IconPassReport;

pub const DEFAULT_PASS_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(1_000);

/// Result of one scheduler pass. `None` means that half could not even
/// list its work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub feeds: Option<FeedPassReport>,
    pub icons: Option<IconPassReport>,
}

pub struct Scheduler {
    engine: Arc<FeedEngine>,
    pass_interval: Duration,
    startup_delay: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<FeedEngine>) -> Self {
        Self::with_timing(engine, DEFAULT_PASS_INTERVAL, DEFAULT_STARTUP_DELAY)
    }

    pub fn with_timing(
        engine: Arc<FeedEngine>,
        pass_interval: Duration,
        startup_delay: Duration,
    ) -> Self {
        Self {
            engine,
            pass_interval,
            startup_delay,
        }
    }

    /// Run passes until the future is dropped.
    pub async fn run_forever(&self) {
        tracing::info!(
            pass_interval_ms = self.pass_interval.as_millis() as u64,
            startup_delay_ms = self.startup_delay.as_millis() as u64,
            "Scheduler started"
        );

        tokio::time::sleep(self.startup_delay).await;

        loop {
            self.run_pass().await;
            tokio::time::sleep(self.pass_interval).await;
        }
    }

    /// One feed-sync pass followed by one icon-refresh pass. Never fails.
    pub async fn run_pass(&self) -> PassReport {
        let feeds = match self.engine.sync_all_feeds(false).await {
            Ok(report) => {
                if report.updated > 0 {
                    tracing::info!(
                        updated = report.updated,
                        new_items = report.new_items,
                        failed = report.failed,
                        "Feed pass complete"
                    );
                } else {
                    tracing::debug!(
                        skipped = report.skipped,
                        unchanged = report.unchanged,
                        failed = report.failed,
                        "Feed pass complete"
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list feeds for sync pass");
                None
            }
        };

        let icons = match self.engine.refresh_icons(false).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Failed to list domains for icon pass");
                None
            }
        };

        PassReport { feeds, icons }
    }
}
