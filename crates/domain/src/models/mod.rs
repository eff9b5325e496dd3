//! Domain models for mission tracking.

pub mod mission;
pub mod position;
pub mod share_link;
pub mod tracking;

pub use mission::{Mission, MissionStatus};
pub use position::{Coordinates, HistoryPosition, LivePosition, PositionSample, SampleOrigin};
pub use share_link::{LinkAccessError, PublicTrackingLink};
pub use tracking::{
    Availability, EtaSource, SessionStatus, Thresholds, TrackingSnapshot, TrackingView,
    TrajectoryStats,
};
