//! Mission domain model (read-only view of the external mission record).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::position::Coordinates;

// ============================================================================
// Mission Status Enum
// ============================================================================

/// Lifecycle status of a transport mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl MissionStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Pending => "pending",
            MissionStatus::InProgress => "in_progress",
            MissionStatus::Completed => "completed",
            MissionStatus::Cancelled => "cancelled",
        }
    }

    /// A mission can be observed while it is in progress or about to start.
    pub fn is_trackable(&self) -> bool {
        matches!(self, MissionStatus::Pending | MissionStatus::InProgress)
    }

    /// True once the mission has left `in_progress` for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Cancelled)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MissionStatus::Pending),
            "in_progress" => Ok(MissionStatus::InProgress),
            "completed" => Ok(MissionStatus::Completed),
            "cancelled" => Ok(MissionStatus::Cancelled),
            _ => Err(format!(
                "Invalid mission status: {}. Must be one of: pending, in_progress, completed, cancelled",
                s
            )),
        }
    }
}

// ============================================================================
// Core Model
// ============================================================================

/// The subset of a mission record the tracking engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: Uuid,
    pub status: MissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_tracking_link: Option<String>,
}

impl Mission {
    /// Destination used for distance-remaining and ETA.
    pub fn destination(&self) -> Option<Coordinates> {
        self.delivery
    }
}

/// Builds optional coordinates from a nullable latitude/longitude column pair.
pub fn coordinates_from_columns(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
