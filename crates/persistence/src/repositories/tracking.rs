//! Position reads for tracking sessions.

use async_trait::async_trait;
use domain::models::{HistoryPosition, LivePosition, Mission};
use domain::services::{TrackingSource, TrackingSourceError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{TrackingHistoryEntity, TrackingLiveEntity};
use crate::metrics::{QueryTimer, Table};
use crate::repositories::MissionRepository;

/// Read-only access to the history and live position tables.
///
/// Both tables are written by the device reporting pipeline.
#[derive(Clone)]
pub struct TrackingRepository {
    pool: PgPool,
    missions: MissionRepository,
}

impl TrackingRepository {
    /// Creates a new TrackingRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            missions: MissionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns the mission's history, ascending by `recorded_at`.
    pub async fn find_history(
        &self,
        mission_id: Uuid,
    ) -> Result<Vec<TrackingHistoryEntity>, sqlx::Error> {
        let timer = QueryTimer::start(Table::TrackingHistory, "find_history");

        let result = sqlx::query_as::<_, TrackingHistoryEntity>(
            r#"
            SELECT id, mission_id, latitude, longitude, speed, bearing, accuracy, recorded_at
            FROM mission_tracking_history
            WHERE mission_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await;

        timer.finish(result)
    }

    /// Returns the mission's live slot, active or not.
    pub async fn find_live(
        &self,
        mission_id: Uuid,
    ) -> Result<Option<TrackingLiveEntity>, sqlx::Error> {
        let timer = QueryTimer::start(Table::TrackingLive, "find_live");

        let result = sqlx::query_as::<_, TrackingLiveEntity>(
            r#"
            SELECT id, mission_id, latitude, longitude, speed, bearing, accuracy,
                   last_update, is_active
            FROM mission_tracking_live
            WHERE mission_id = $1
            "#,
        )
        .bind(mission_id)
        .fetch_optional(&self.pool)
        .await;

        timer.finish(result)
    }
}

fn storage_error(e: sqlx::Error) -> TrackingSourceError {
    TrackingSourceError::Storage(e.to_string())
}

#[async_trait]
impl TrackingSource for TrackingRepository {
    async fn load_mission(&self, mission_id: Uuid) -> Result<Option<Mission>, TrackingSourceError> {
        self.missions
            .find_by_id(mission_id)
            .await
            .map_err(storage_error)?
            .map(Mission::try_from)
            .transpose()
            .map_err(TrackingSourceError::Malformed)
    }

    async fn load_history(
        &self,
        mission_id: Uuid,
    ) -> Result<Vec<HistoryPosition>, TrackingSourceError> {
        let rows = self.find_history(mission_id).await.map_err(storage_error)?;
        Ok(rows.into_iter().map(HistoryPosition::from).collect())
    }

    async fn load_live(&self, mission_id: Uuid) -> Result<Option<LivePosition>, TrackingSourceError> {
        let row = self.find_live(mission_id).await.map_err(storage_error)?;
        Ok(row.map(LivePosition::from))
    }
}
