//! Repository implementations for database operations.

pub mod mission;
pub mod public_tracking_link;
pub mod tracking;

pub use mission::MissionRepository;
pub use public_tracking_link::PublicTrackingLinkRepository;
pub use tracking::TrackingRepository;
