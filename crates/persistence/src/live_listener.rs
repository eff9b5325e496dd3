//! Postgres LISTEN/NOTIFY bridge for live position updates.
//!
//! A trigger on `mission_tracking_live` sends every inserted or updated row
//! on the `mission_tracking_live` channel. This task decodes those payloads
//! and publishes them into the in-process [`LiveUpdateHub`].

use std::sync::Arc;
use std::time::Duration;

use domain::models::LivePosition;
use domain::services::LiveUpdateHub;
use metrics::counter;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::watch;

/// Notification channel fed by the live-slot trigger.
pub const LIVE_CHANNEL: &str = "mission_tracking_live";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Decodes one notification payload.
pub fn decode_payload(payload: &str) -> Result<LivePosition, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Runs until `shutdown` flips to true, reconnecting after connection loss.
///
/// Events sent while disconnected are lost; tracking sessions pick them up on
/// their next re-sync.
pub async fn run_live_listener(
    pool: PgPool,
    hub: Arc<LiveUpdateHub>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(channel = LIVE_CHANNEL, "Starting live position listener");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match listen(&pool, &hub, &mut shutdown).await {
            Ok(()) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Live position listener disconnected, reconnecting");
                counter!("live_listener_reconnects_total").increment(1);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::info!("Live position listener stopped");
}

/// Listens on one connection. Returns `Ok` on shutdown.
async fn listen(
    pool: &PgPool,
    hub: &LiveUpdateHub,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(LIVE_CHANNEL).await?;
    tracing::debug!(channel = LIVE_CHANNEL, "Listening for live position notifications");

    loop {
        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            notification = listener.recv() => {
                let notification = notification?;
                match decode_payload(notification.payload()) {
                    Ok(position) => {
                        let delivered = hub.publish(position).await;
                        counter!("live_notifications_total", "outcome" => "published").increment(1);
                        tracing::trace!(delivered, "Live position notification published");
                    }
                    Err(e) => {
                        counter!("live_notifications_total", "outcome" => "malformed").increment(1);
                        tracing::warn!(error = %e, "Ignoring malformed live position notification");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_trigger_payload() {
        // Shape produced by notify_mission_tracking_live().
        let payload = r#"{"id" : "6f1c1f9e-2b39-4c61-9a55-3a0c1e4b9d01", "mission_id" : "1d5e7c1a-7d41-4d7b-8a3e-0b6d2f1a9c22", "latitude" : 48.8566, "longitude" : 2.3522, "speed" : 13.4, "heading" : null, "accuracy" : 9, "last_update" : "2024-05-01T10:00:00.123456+00:00", "is_active" : true}"#;
        let position = decode_payload(payload).unwrap();
        assert_eq!(position.latitude, 48.8566);
        assert_eq!(position.heading, None);
        assert_eq!(position.accuracy, Some(9.0));
        assert!(position.is_active);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_payload("not json").is_err());
        assert!(decode_payload(r#"{"id": 1}"#).is_err());
    }
}
