use super::WagerService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info};

/// Periodically settles completed matches of every tournament with open bets
pub struct SettlementPoller {
    wagers: Arc<WagerService>,
    poll_interval: Duration,
}

impl SettlementPoller {
    /// Create a new settlement poller
    pub fn new(wagers: Arc<WagerService>) -> Self {
        Self {
            wagers,
            poll_interval: Duration::from_secs(60),
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start polling. Never returns.
    pub async fn start(self) {
        let mut interval = time::interval(self.poll_interval);
        info!("Settlement poller started, polling every {:?}", self.poll_interval);

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    /// One settlement pass. Returns the number of matches settled.
    pub async fn run_once(&self) -> usize {
        match self.wagers.settle_open_tournaments().await {
            Ok(reports) => {
                let settled: usize = reports.iter().map(|r| r.matches_settled).sum();
                let paid: i64 = reports.iter().map(|r| r.total_paid_out).sum();
                if settled > 0 {
                    info!(tournaments = reports.len(), matches = settled, paid_out = paid, "Settlement pass complete");
                } else {
                    debug!(tournaments = reports.len(), "Settlement pass found nothing to settle");
                }
                settled
            }
            Err(e) => {
                error!("Error in settlement poller: {}", e);
                0
            }
        }
    }
}
