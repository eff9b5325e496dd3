//! Mission tracking endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use domain::models::{Availability, SessionStatus, TrackingView};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::RequestId;

/// Maps a session view onto an HTTP outcome.
///
/// A session still loading after the initial wait answers 202 with the
/// loading view; callers poll again.
pub fn view_response(view: TrackingView) -> Result<(StatusCode, Json<TrackingView>), ApiError> {
    if view.status == SessionStatus::Loading {
        return Ok((StatusCode::ACCEPTED, Json(view)));
    }

    match &view.availability {
        Availability::Ready | Availability::Degraded { .. } => Ok((StatusCode::OK, Json(view))),
        Availability::MissionNotFound => Err(ApiError::NotFound("Mission not found".into())),
        Availability::MissionEnded { status } => {
            Err(ApiError::Conflict(format!("Mission is {}", status)))
        }
        Availability::Unavailable { reason } => Err(ApiError::ServiceUnavailable(format!(
            "Tracking unavailable: {}",
            reason
        ))),
    }
}

/// Start observing a mission (or join the running session) and return its view.
///
/// GET /api/v1/missions/:mission_id/tracking
pub async fn get_tracking(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(mission_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TrackingView>), ApiError> {
    let view = state.registry.observe(mission_id).await;
    tracing::debug!(
        request_id = %request_id.0,
        mission_id = %mission_id,
        status = view.status.as_str(),
        "Tracking view served"
    );
    view_response(view)
}

/// Explicit re-sync of a mission's tracking data.
///
/// POST /api/v1/missions/:mission_id/tracking/refresh
pub async fn refresh_tracking(
    State(state): State<AppState>,
    Path(mission_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TrackingView>), ApiError> {
    view_response(state.registry.refresh(mission_id).await)
}

/// Stop observing a mission. Idempotent.
///
/// DELETE /api/v1/missions/:mission_id/tracking
pub async fn stop_tracking(
    State(state): State<AppState>,
    Path(mission_id): Path<Uuid>,
) -> StatusCode {
    state.registry.stop(mission_id).await;
    StatusCode::NO_CONTENT
}
