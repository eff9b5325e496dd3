//! Domain layer for the mission tracking service.
//!
//! This crate contains:
//! - Domain models (Mission, PositionSample, TrackingSnapshot, PublicTrackingLink)
//! - The tracking engine (trajectory merge, ETA estimation, tracking sessions)
//! - Collaborator traits implemented by the persistence and api crates

pub mod models;
pub mod services;
