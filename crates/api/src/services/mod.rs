//! Service-side adapters: routing, share tokens and the session registry.

pub mod routing;
pub mod share_links;
pub mod tracking_registry;

pub use routing::{CircuitState, OsrmRoutingClient};
pub use share_links::{LinkResolveError, PublicLinkResolver, ShareTokenService};
pub use tracking_registry::TrackingRegistry;
