//! Public tracking URL issuance.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Mission;

/// Errors raised while issuing a public tracking link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareLinkError {
    #[error("Mission not found")]
    MissionNotFound,

    #[error("Failed to issue tracking token: {0}")]
    TokenIssuance(String),

    #[error("Failed to persist tracking link: {0}")]
    Persistence(String),
}

/// Mints and revokes unguessable share tokens.
#[async_trait]
pub trait ShareTokenIssuer: Send + Sync {
    async fn issue_token(&self, mission_id: Uuid) -> Result<String, ShareLinkError>;

    async fn revoke_token(&self, token: &str) -> Result<(), ShareLinkError>;
}

/// Stores the link on the mission record.
#[async_trait]
pub trait MissionLinkStore: Send + Sync {
    /// Sets the link only if none is stored yet and returns the stored value either way.
    async fn set_public_tracking_link_if_absent(
        &self,
        mission_id: Uuid,
        url: &str,
    ) -> Result<String, ShareLinkError>;
}

/// Builds `<origin>/tracking/<token>`.
pub fn tracking_url(origin: &str, token: &str) -> String {
    format!("{}/tracking/{}", origin.trim_end_matches('/'), token)
}

/// Extracts the token from a URL built by [`tracking_url`].
pub fn token_from_url(url: &str) -> Option<&str> {
    url.rsplit_once("/tracking/")
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

/// Returns the mission's public tracking URL, creating it on first use.
#[derive(Clone)]
pub struct ShareLinkIssuer {
    tokens: Arc<dyn ShareTokenIssuer>,
    store: Arc<dyn MissionLinkStore>,
    public_origin: String,
}

impl ShareLinkIssuer {
    pub fn new(
        tokens: Arc<dyn ShareTokenIssuer>,
        store: Arc<dyn MissionLinkStore>,
        public_origin: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            store,
            public_origin: public_origin.into(),
        }
    }

    pub async fn get_or_create(&self, mission: &Mission) -> Result<String, ShareLinkError> {
        if let Some(existing) = &mission.public_tracking_link {
            return Ok(existing.clone());
        }

        let token = self.tokens.issue_token(mission.id).await?;
        let candidate = tracking_url(&self.public_origin, &token);
        let persisted = self
            .store
            .set_public_tracking_link_if_absent(mission.id, &candidate)
            .await?;

        if persisted != candidate {
            tracing::info!(
                mission_id = %mission.id,
                "Tracking link already issued concurrently, discarding new token"
            );
            if let Err(e) = self.tokens.revoke_token(&token).await {
                tracing::warn!(mission_id = %mission.id, error = %e, "Failed to revoke unused tracking token");
            }
        }

        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MissionStatus;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingTokens {
        issued: AtomicUsize,
        revoked: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl ShareTokenIssuer for CountingTokens {
        async fn issue_token(&self, _mission_id: Uuid) -> Result<String, ShareLinkError> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{n}"))
        }

        async fn revoke_token(&self, token: &str) -> Result<(), ShareLinkError> {
            self.revoked.lock().unwrap().insert(token.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryLinks {
        links: Mutex<HashMap<Uuid, String>>,
    }

    #[async_trait]
    impl MissionLinkStore for InMemoryLinks {
        async fn set_public_tracking_link_if_absent(
            &self,
            mission_id: Uuid,
            url: &str,
        ) -> Result<String, ShareLinkError> {
            let mut links = self.links.lock().unwrap();
            Ok(links
                .entry(mission_id)
                .or_insert_with(|| url.to_string())
                .clone())
        }
    }

    struct FailingTokens;

    #[async_trait]
    impl ShareTokenIssuer for FailingTokens {
        async fn issue_token(&self, _mission_id: Uuid) -> Result<String, ShareLinkError> {
            Err(ShareLinkError::TokenIssuance("unavailable".into()))
        }

        async fn revoke_token(&self, _token: &str) -> Result<(), ShareLinkError> {
            Ok(())
        }
    }

    fn mission(link: Option<&str>) -> Mission {
        Mission {
            id: Uuid::new_v4(),
            status: MissionStatus::InProgress,
            pickup: None,
            delivery: None,
            public_tracking_link: link.map(str::to_string),
        }
    }

    fn issuer(tokens: Arc<CountingTokens>, store: Arc<InMemoryLinks>) -> ShareLinkIssuer {
        ShareLinkIssuer::new(tokens, store, "https://track.example.com/")
    }

    #[test]
    fn test_tracking_url() {
        assert_eq!(
            tracking_url("https://track.example.com/", "abc"),
            "https://track.example.com/tracking/abc"
        );
        assert_eq!(
            tracking_url("http://localhost:8080", "abc"),
            "http://localhost:8080/tracking/abc"
        );
    }

    #[test]
    fn test_token_from_url() {
        assert_eq!(
            token_from_url("https://track.example.com/tracking/abc"),
            Some("abc")
        );
        assert_eq!(token_from_url("https://track.example.com/tracking/"), None);
        assert_eq!(token_from_url("https://track.example.com/"), None);
    }

    #[tokio::test]
    async fn test_existing_link_returned_unchanged() {
        let tokens = Arc::new(CountingTokens::default());
        let store = Arc::new(InMemoryLinks::default());
        let issuer = issuer(tokens.clone(), store);

        let url = issuer
            .get_or_create(&mission(Some("https://old.example.com/tracking/x")))
            .await
            .unwrap();
        assert_eq!(url, "https://old.example.com/tracking/x");
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_call_observes_first_result() {
        let tokens = Arc::new(CountingTokens::default());
        let store = Arc::new(InMemoryLinks::default());
        let issuer = issuer(tokens.clone(), store);
        let m = mission(None);

        let first = issuer.get_or_create(&m).await.unwrap();
        // The caller still holds the stale record without the link.
        let second = issuer.get_or_create(&m).await.unwrap();

        assert_eq!(first, "https://track.example.com/tracking/token-0");
        assert_eq!(first, second);
        assert!(tokens.revoked.lock().unwrap().contains("token-1"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_agree_on_one_link() {
        let tokens = Arc::new(CountingTokens::default());
        let store = Arc::new(InMemoryLinks::default());
        let issuer = issuer(tokens.clone(), store);
        let m = mission(None);

        let (a, b) = tokio::join!(issuer.get_or_create(&m), issuer.get_or_create(&m));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);
        assert_eq!(tokens.revoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_failure_surfaces() {
        let issuer = ShareLinkIssuer::new(
            Arc::new(FailingTokens),
            Arc::new(InMemoryLinks::default()),
            "https://track.example.com",
        );
        let result = issuer.get_or_create(&mission(None)).await;
        assert!(matches!(result, Err(ShareLinkError::TokenIssuance(_))));
    }
}
