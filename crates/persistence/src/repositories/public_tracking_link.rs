//! Repository for public tracking link database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::PublicTrackingLinkEntity;
use crate::metrics::{QueryTimer, Table};

/// Repository for public tracking link operations.
#[derive(Clone)]
pub struct PublicTrackingLinkRepository {
    pool: PgPool,
}

impl PublicTrackingLinkRepository {
    /// Creates a new public tracking link repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a newly minted token.
    pub async fn create(
        &self,
        token: &str,
        mission_id: Uuid,
        expires_at: DateTime<Utc>,
        max_accesses: i64,
    ) -> Result<PublicTrackingLinkEntity, sqlx::Error> {
        let timer = QueryTimer::start(Table::PublicTrackingLinks, "create");

        let result = sqlx::query_as::<_, PublicTrackingLinkEntity>(
            r#"
            INSERT INTO public_tracking_links (token, mission_id, expires_at, max_accesses)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token, mission_id, is_active, expires_at, access_count, max_accesses, created_at
            "#,
        )
        .bind(token)
        .bind(mission_id)
        .bind(expires_at)
        .bind(max_accesses)
        .fetch_one(&self.pool)
        .await;

        timer.finish(result)
    }

    /// Finds a link by its token.
    pub async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<PublicTrackingLinkEntity>, sqlx::Error> {
        let timer = QueryTimer::start(Table::PublicTrackingLinks, "find_by_token");

        let result = sqlx::query_as::<_, PublicTrackingLinkEntity>(
            r#"
            SELECT id, token, mission_id, is_active, expires_at, access_count, max_accesses, created_at
            FROM public_tracking_links
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await;

        timer.finish(result)
    }

    /// Counts one access if the link is usable right now.
    ///
    /// The usability conditions are part of the `UPDATE` so concurrent
    /// accesses cannot exceed `max_accesses`. Returns `None` when the link
    /// is unknown or refused; callers re-read to find out why.
    pub async fn record_access(
        &self,
        token: &str,
    ) -> Result<Option<PublicTrackingLinkEntity>, sqlx::Error> {
        let timer = QueryTimer::start(Table::PublicTrackingLinks, "record_access");

        let result = sqlx::query_as::<_, PublicTrackingLinkEntity>(
            r#"
            UPDATE public_tracking_links
            SET access_count = access_count + 1
            WHERE token = $1
              AND is_active
              AND expires_at > NOW()
              AND access_count < max_accesses
            RETURNING id, token, mission_id, is_active, expires_at, access_count, max_accesses, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await;

        timer.finish(result)
    }

    /// Deactivates a token. Returns `true` if it was active.
    pub async fn deactivate(&self, token: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::start(Table::PublicTrackingLinks, "deactivate");

        let result = sqlx::query(
            "UPDATE public_tracking_links SET is_active = FALSE WHERE token = $1 AND is_active",
        )
        .bind(token)
        .execute(&self.pool)
        .await;

        Ok(timer.finish(result)?.rows_affected() > 0)
    }

    /// Deactivates every link past its expiry. Returns the number of links changed.
    pub async fn deactivate_expired(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::start(Table::PublicTrackingLinks, "deactivate_expired");

        let result = sqlx::query(
            "UPDATE public_tracking_links SET is_active = FALSE WHERE is_active AND expires_at <= NOW()",
        )
        .execute(&self.pool)
        .await;

        Ok(timer.finish(result)?.rows_affected())
    }
}
