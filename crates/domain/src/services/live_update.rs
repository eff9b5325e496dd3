//! Push subscription for live position events.
//!
//! Delivery is at-least-once with no ordering guarantee; consumers dedup by
//! sample id and re-sync periodically, so a missed event is never fatal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::LivePosition;

/// Callback invoked for each delivered event. Must not block.
pub type LiveUpdateHandler = Arc<dyn Fn(LivePosition) + Send + Sync>;

/// Errors raised while subscribing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Live update channel is closed")]
    Closed,

    #[error("Live update transport error: {0}")]
    Transport(String),
}

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    mission_id: Uuid,
}

impl SubscriptionHandle {
    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }
}

/// Transport-agnostic live update subscription.
#[async_trait]
pub trait LiveUpdateChannel: Send + Sync {
    async fn subscribe(
        &self,
        mission_id: Uuid,
        handler: LiveUpdateHandler,
    ) -> Result<SubscriptionHandle, ChannelError>;

    /// Idempotent. No event is delivered to the handler once this returns.
    async fn unsubscribe(&self, handle: &SubscriptionHandle);
}

/// In-process fan-out of live position events by mission id.
#[derive(Default)]
pub struct LiveUpdateHub {
    subscribers: RwLock<HashMap<Uuid, HashMap<u64, LiveUpdateHandler>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LiveUpdateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to every subscriber of its mission. Returns the number of handlers called.
    pub async fn publish(&self, position: LivePosition) -> usize {
        // The read guard is held across delivery so unsubscribe can wait for in-flight events.
        let subscribers = self.subscribers.read().await;
        let Some(handlers) = subscribers.get(&position.mission_id) else {
            return 0;
        };
        for handler in handlers.values() {
            handler(position.clone());
        }
        handlers.len()
    }

    pub async fn subscriber_count(&self, mission_id: Uuid) -> usize {
        self.subscribers
            .read()
            .await
            .get(&mission_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Drops all subscriptions and refuses new ones.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.write().await.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveUpdateChannel for LiveUpdateHub {
    async fn subscribe(
        &self,
        mission_id: Uuid,
        handler: LiveUpdateHandler,
    ) -> Result<SubscriptionHandle, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .await
            .entry(mission_id)
            .or_default()
            .insert(id, handler);
        tracing::debug!(mission_id = %mission_id, subscription_id = id, "Live update subscription added");
        Ok(SubscriptionHandle { id, mission_id })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(handlers) = subscribers.get_mut(&handle.mission_id) {
            if handlers.remove(&handle.id).is_some() {
                tracing::debug!(mission_id = %handle.mission_id, subscription_id = handle.id, "Live update subscription removed");
            }
            if handlers.is_empty() {
                subscribers.remove(&handle.mission_id);
            }
        }
    }
}
