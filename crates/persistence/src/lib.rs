//! Persistence layer for the mission tracking service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain collaborator traits
//! - The LISTEN/NOTIFY bridge feeding live position updates

pub mod db;
pub mod entities;
pub mod live_listener;
pub mod metrics;
pub mod repositories;
