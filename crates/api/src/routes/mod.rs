//! HTTP route handlers.

pub mod health;
pub mod public_tracking;
pub mod share_links;
pub mod tracking;
