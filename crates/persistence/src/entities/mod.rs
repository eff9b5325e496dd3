//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod mission;
pub mod public_tracking_link;
pub mod tracking;

pub use mission::MissionEntity;
pub use public_tracking_link::PublicTrackingLinkEntity;
pub use tracking::{TrackingHistoryEntity, TrackingLiveEntity};
