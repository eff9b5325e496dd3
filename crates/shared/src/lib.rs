//! Shared utilities for the mission tracking engine.
//!
//! This crate provides common functionality used across all other crates:
//! - Great-circle distance and speed conversions
//! - Share token generation
//! - Position range validation

pub mod crypto;
pub mod geo;
pub mod validation;
