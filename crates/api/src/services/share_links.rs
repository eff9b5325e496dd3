//! Public tracking tokens backed by the `public_tracking_links` table.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain::models::{LinkAccessError, PublicTrackingLink};
use domain::services::{ShareLinkError, ShareTokenIssuer};
use persistence::repositories::PublicTrackingLinkRepository;
use shared::crypto::{generate_share_token, is_well_formed_share_token};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ShareLinkConfig;
use crate::error::ApiError;
use crate::middleware::metrics::record_public_link_access;

/// Errors raised while resolving a public token.
#[derive(Debug, Error)]
pub enum LinkResolveError {
    #[error(transparent)]
    Access(#[from] LinkAccessError),

    #[error("Failed to resolve tracking link: {0}")]
    Storage(String),
}

impl From<LinkResolveError> for ApiError {
    fn from(err: LinkResolveError) -> Self {
        match err {
            LinkResolveError::Access(e) => e.into(),
            LinkResolveError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

/// Turns a public token into the link it grants, counting the access.
#[async_trait]
pub trait PublicLinkResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<PublicTrackingLink, LinkResolveError>;
}

/// Issues, revokes and resolves share tokens.
#[derive(Clone)]
pub struct ShareTokenService {
    repo: PublicTrackingLinkRepository,
    ttl: Duration,
    max_accesses: i64,
}

impl ShareTokenService {
    pub fn new(repo: PublicTrackingLinkRepository, config: &ShareLinkConfig) -> Self {
        Self {
            repo,
            ttl: Duration::days(config.token_ttl_days),
            max_accesses: config.max_accesses,
        }
    }

    /// Deactivates links past their expiry.
    pub async fn expire_links(&self) -> Result<u64, sqlx::Error> {
        self.repo.deactivate_expired().await
    }
}

#[async_trait]
impl ShareTokenIssuer for ShareTokenService {
    async fn issue_token(&self, mission_id: Uuid) -> Result<String, ShareLinkError> {
        let token = generate_share_token();
        self.repo
            .create(&token, mission_id, Utc::now() + self.ttl, self.max_accesses)
            .await
            .map_err(|e| match e {
                // Foreign key on mission_id.
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                    ShareLinkError::MissionNotFound
                }
                e => ShareLinkError::TokenIssuance(e.to_string()),
            })?;
        tracing::info!(mission_id = %mission_id, "Public tracking token issued");
        Ok(token)
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ShareLinkError> {
        self.repo
            .deactivate(token)
            .await
            .map(|_| ())
            .map_err(|e| ShareLinkError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl PublicLinkResolver for ShareTokenService {
    async fn resolve(&self, token: &str) -> Result<PublicTrackingLink, LinkResolveError> {
        if !is_well_formed_share_token(token) {
            record_public_link_access(LinkAccessError::NotFound.as_str());
            return Err(LinkAccessError::NotFound.into());
        }

        let storage = |e: sqlx::Error| LinkResolveError::Storage(e.to_string());

        if let Some(entity) = self.repo.record_access(token).await.map_err(storage)? {
            record_public_link_access("ok");
            return Ok(entity.into());
        }

        // Refused: re-read to report why.
        let reason = match self.repo.find_by_token(token).await.map_err(storage)? {
            None => LinkAccessError::NotFound,
            Some(entity) => PublicTrackingLink::from(entity)
                .check_access(Utc::now())
                .err()
                // Usable again by now; the refusal was a race on the last access.
                .unwrap_or(LinkAccessError::AccessLimitExceeded),
        };
        record_public_link_access(reason.as_str());
        Err(reason.into())
    }
}
