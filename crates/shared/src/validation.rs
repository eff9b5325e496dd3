//! Range validation for position samples.

use chrono::{DateTime, Duration, Utc};
use validator::ValidationError;

/// Maximum allowed future timestamp tolerance in seconds (clock skew between device and server).
pub const MAX_FUTURE_TOLERANCE_SECS: i64 = 300;

fn range_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(range_error(
            "latitude_range",
            "Latitude must be between -90 and 90",
        ))
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(range_error(
            "longitude_range",
            "Longitude must be between -180 and 180",
        ))
    }
}

/// Validates that accuracy (uncertainty radius in meters) is non-negative.
pub fn validate_accuracy(accuracy: f64) -> Result<(), ValidationError> {
    if accuracy >= 0.0 {
        Ok(())
    } else {
        Err(range_error("accuracy_range", "Accuracy must be non-negative"))
    }
}

/// Validates that heading is within valid range (0 to 360).
pub fn validate_heading(heading: f64) -> Result<(), ValidationError> {
    if (0.0..=360.0).contains(&heading) {
        Ok(())
    } else {
        Err(range_error(
            "heading_range",
            "Heading must be between 0 and 360",
        ))
    }
}

/// Validates that speed (meters per second) is non-negative.
pub fn validate_speed(speed: f64) -> Result<(), ValidationError> {
    if speed >= 0.0 {
        Ok(())
    } else {
        Err(range_error("speed_range", "Speed must be non-negative"))
    }
}

/// Validates that a fix is not further ahead of `now` than the clock-skew tolerance.
pub fn validate_recorded_at(
    recorded_at: &DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    let future_limit = now + Duration::seconds(MAX_FUTURE_TOLERANCE_SECS);
    if *recorded_at > future_limit {
        Err(range_error(
            "timestamp_future",
            "Timestamp cannot be in the future",
        ))
    } else {
        Ok(())
    }
}
