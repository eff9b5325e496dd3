//! Background job scheduler and job implementations.

mod expire_links;
mod pool_metrics;
mod rate_limit_prune;
mod scheduler;
mod tracking_resync;

pub use expire_links::ExpireTrackingLinksJob;
pub use pool_metrics::PoolMetricsJob;
pub use rate_limit_prune::RateLimitPruneJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use tracking_resync::TrackingResyncJob;
