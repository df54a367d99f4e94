use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::Notification;
use crate::services::overview::OverviewService;

/// Recomputes alerts on a fixed interval and publishes the latest set.
pub struct AlertScheduler {
    overview: OverviewService,
    interval: Duration,
    sender: watch::Sender<Vec<Notification>>,
}

impl AlertScheduler {
    pub fn new(overview: OverviewService, interval_secs: u64) -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            overview,
            interval: Duration::from_secs(interval_secs),
            sender,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.sender.subscribe()
    }

    /// Runs forever; a failed tick is logged and the loop continues.
    pub async fn start(self) {
        info!("Starting alert scheduler (interval: {:?})", self.interval);
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_once().await {
                Ok(notifications) => {
                    for n in notifications.iter().filter(|n| !seen.contains(&n.id)) {
                        info!("New alert [{}] {}: {}", n.id, n.title, n.description);
                    }
                    seen = notifications.iter().map(|n| n.id.clone()).collect();
                    self.sender.send_replace(notifications);
                }
                Err(e) => {
                    warn!("Alert evaluation failed: {:?}", e);
                }
            }
        }
    }

    async fn run_once(&self) -> Result<Vec<Notification>, AppError> {
        self.overview.notifications(Utc::now()).await
    }
}
