//! Public tracking link domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why a public tracking token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkAccessError {
    #[error("Tracking link not found")]
    NotFound,

    #[error("Tracking link has been disabled")]
    Disabled,

    #[error("Tracking link has expired")]
    Expired,

    #[error("Tracking link access limit reached")]
    AccessLimitExceeded,
}

impl LinkAccessError {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAccessError::NotFound => "not_found",
            LinkAccessError::Disabled => "disabled",
            LinkAccessError::Expired => "expired",
            LinkAccessError::AccessLimitExceeded => "limit_exceeded",
        }
    }
}

/// A token that grants anonymous read access to one mission's tracking view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTrackingLink {
    pub id: Uuid,
    pub token: String,
    pub mission_id: Uuid,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub access_count: i64,
    pub max_accesses: i64,
    pub created_at: DateTime<Utc>,
}

impl PublicTrackingLink {
    /// Checks whether one more access is allowed at `now`.
    pub fn check_access(&self, now: DateTime<Utc>) -> Result<(), LinkAccessError> {
        if !self.is_active {
            return Err(LinkAccessError::Disabled);
        }
        if now >= self.expires_at {
            return Err(LinkAccessError::Expired);
        }
        if self.access_count >= self.max_accesses {
            return Err(LinkAccessError::AccessLimitExceeded);
        }
        Ok(())
    }
}
