//! Background job that re-syncs every observed mission.

use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::services::TrackingRegistry;

/// Sends a full reload to each running session and evicts stopped ones.
///
/// Covers live updates lost while the push channel was down.
pub struct TrackingResyncJob {
    registry: Arc<TrackingRegistry>,
    interval_secs: u64,
}

impl TrackingResyncJob {
    pub fn new(registry: Arc<TrackingRegistry>, interval_secs: u64) -> Self {
        Self {
            registry,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for TrackingResyncJob {
    fn name(&self) -> &'static str {
        "tracking_resync"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    fn is_frequent(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let refreshed = self.registry.refresh_all().await;
        tracing::debug!(sessions = refreshed, "Tracking sessions re-synced");
        Ok(())
    }
}
