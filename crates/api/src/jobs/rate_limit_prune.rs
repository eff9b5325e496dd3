//! Background job that forgets idle public-token rate limiters.

use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

pub struct RateLimitPruneJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimitPruneJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitPruneJob {
    fn name(&self) -> &'static str {
        "rate_limit_prune"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), String> {
        let remaining = self.limiter.prune();
        tracing::debug!(tracked_tokens = remaining, "Public rate limiters pruned");
        Ok(())
    }
}
