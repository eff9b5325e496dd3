//! Tracking engine services.
//!
//! Services contain the merge, estimation and session logic that operates on
//! domain models. I/O happens only behind the collaborator traits.

pub mod eta;
pub mod live_update;
pub mod routing;
pub mod share_link;
pub mod tracking_session;
pub mod trajectory;

pub use eta::{EtaEstimate, EtaEstimator, EtaSettings};
pub use live_update::{
    ChannelError, LiveUpdateChannel, LiveUpdateHandler, LiveUpdateHub, SubscriptionHandle,
};
pub use routing::{DisabledRoutingClient, Route, RoutingClient, RoutingError};
pub use share_link::{
    token_from_url, tracking_url, MissionLinkStore, ShareLinkError, ShareLinkIssuer,
    ShareTokenIssuer,
};
pub use tracking_session::{
    SessionCommand, SessionConfig, SessionDeps, SessionHandle, SessionState, TrackingSession,
    TrackingSource, TrackingSourceError,
};
