//! Mission repository for database operations.

use async_trait::async_trait;
use domain::services::{MissionLinkStore, ShareLinkError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::MissionEntity;
use crate::metrics::{QueryTimer, Table};

/// Repository for the mission columns this service reads or sets.
#[derive(Clone)]
pub struct MissionRepository {
    pool: PgPool,
}

impl MissionRepository {
    /// Creates a new MissionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find mission by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MissionEntity>, sqlx::Error> {
        let timer = QueryTimer::start(Table::Missions, "find_by_id");

        let result = sqlx::query_as::<_, MissionEntity>(
            r#"
            SELECT id, status, pickup_lat, pickup_lng, delivery_lat, delivery_lng,
                   public_tracking_link
            FROM missions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.finish(result)
    }

    /// Sets the public tracking link unless one is already stored.
    ///
    /// Returns the stored link afterwards (ours or a concurrent caller's),
    /// or `None` if the mission does not exist. The conditional update and the
    /// re-read are separate statements so the re-read sees a concurrent
    /// writer's committed value.
    pub async fn store_public_tracking_link(
        &self,
        mission_id: Uuid,
        url: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let claim = QueryTimer::start(Table::Missions, "claim_public_tracking_link");
        let result = sqlx::query(
            r#"
            UPDATE missions
            SET public_tracking_link = $2, updated_at = NOW()
            WHERE id = $1 AND public_tracking_link IS NULL
            "#,
        )
        .bind(mission_id)
        .bind(url)
        .execute(&self.pool)
        .await;
        claim.finish(result)?;

        let reread = QueryTimer::start(Table::Missions, "read_public_tracking_link");
        let result = sqlx::query_scalar::<_, Option<String>>(
            "SELECT public_tracking_link FROM missions WHERE id = $1",
        )
        .bind(mission_id)
        .fetch_optional(&self.pool)
        .await;
        let stored = reread.finish(result)?;

        Ok(stored.flatten())
    }
}

#[async_trait]
impl MissionLinkStore for MissionRepository {
    async fn set_public_tracking_link_if_absent(
        &self,
        mission_id: Uuid,
        url: &str,
    ) -> Result<String, ShareLinkError> {
        self.store_public_tracking_link(mission_id, url)
            .await
            .map_err(|e| ShareLinkError::Persistence(e.to_string()))?
            .ok_or(ShareLinkError::MissionNotFound)
    }
}
