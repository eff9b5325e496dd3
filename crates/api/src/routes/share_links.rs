//! Share link endpoint handler.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub url: String,
}

/// Return the mission's public tracking URL, creating it on first use.
///
/// POST /api/v1/missions/:mission_id/share-link
pub async fn create_share_link(
    State(state): State<AppState>,
    Path(mission_id): Path<Uuid>,
) -> Result<Json<ShareLinkResponse>, ApiError> {
    let mission = state
        .missions
        .load_mission(mission_id)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Mission not found".into()))?;

    let url = state.share_links.get_or_create(&mission).await?;
    Ok(Json(ShareLinkResponse { url }))
}
