//! Public tracking link entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the public_tracking_links table.
#[derive(Debug, Clone, FromRow)]
pub struct PublicTrackingLinkEntity {
    pub id: Uuid,
    pub token: String,
    pub mission_id: Uuid,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub access_count: i64,
    pub max_accesses: i64,
    pub created_at: DateTime<Utc>,
}

impl From<PublicTrackingLinkEntity> for domain::models::PublicTrackingLink {
    fn from(entity: PublicTrackingLinkEntity) -> Self {
        Self {
            id: entity.id,
            token: entity.token,
            mission_id: entity.mission_id,
            is_active: entity.is_active,
            expires_at: entity.expires_at,
            access_count: entity.access_count,
            max_accesses: entity.max_accesses,
            created_at: entity.created_at,
        }
    }
}
