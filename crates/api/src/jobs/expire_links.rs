//! Background job to deactivate expired public tracking links.

use super::scheduler::{Job, JobFrequency};
use crate::services::ShareTokenService;

pub struct ExpireTrackingLinksJob {
    tokens: ShareTokenService,
}

impl ExpireTrackingLinksJob {
    pub fn new(tokens: ShareTokenService) -> Self {
        Self { tokens }
    }
}

#[async_trait::async_trait]
impl Job for ExpireTrackingLinksJob {
    fn name(&self) -> &'static str {
        "expire_tracking_links"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self
            .tokens
            .expire_links()
            .await
            .map_err(|e| format!("Failed to expire tracking links: {}", e))?;
        if expired > 0 {
            tracing::info!(expired, "Expired public tracking links deactivated");
        }
        Ok(())
    }
}
