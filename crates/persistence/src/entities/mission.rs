//! Mission entity (database row mapping).

use domain::models::mission::coordinates_from_columns;
use domain::models::{Mission, MissionStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the columns of `missions` read by this service.
#[derive(Debug, Clone, FromRow)]
pub struct MissionEntity {
    pub id: Uuid,
    pub status: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub delivery_lat: Option<f64>,
    pub delivery_lng: Option<f64>,
    pub public_tracking_link: Option<String>,
}

impl TryFrom<MissionEntity> for Mission {
    type Error = String;

    fn try_from(entity: MissionEntity) -> Result<Self, Self::Error> {
        let status = entity.status.parse::<MissionStatus>()?;
        Ok(Self {
            id: entity.id,
            status,
            pickup: coordinates_from_columns(entity.pickup_lat, entity.pickup_lng),
            delivery: coordinates_from_columns(entity.delivery_lat, entity.delivery_lng),
            public_tracking_link: entity.public_tracking_link,
        })
    }
}
