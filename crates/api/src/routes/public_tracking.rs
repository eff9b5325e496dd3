//! Anonymous tracking by share token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::TrackingView;

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::tracking::view_response;

/// Resolve a public token and return the mission's tracking view.
///
/// GET /tracking/:token
pub async fn get_public_tracking(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<TrackingView>), ApiError> {
    let link = state.links.resolve(&token).await?;
    view_response(state.registry.observe(link.mission_id).await)
}
