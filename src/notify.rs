//! Notification dispatch. Delivery is an external capability: `Notifier`
//! is the seam, `send_with_retry` the policy (bounded attempts with
//! exponential backoff), and `NotifyHub` an in-process broadcast
//! implementation with per-user channels.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::limits::{NOTIFY_RETRY_ATTEMPTS, NOTIFY_RETRY_BASE_MS};
use crate::observability;

const CHANNEL_CAPACITY: usize = 256;

/// User-facing message produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Ulid,
    pub phone_number: String,
    pub message: String,
}

impl Notification {
    /// Wire payload for an external delivery gateway.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "to": self.phone_number,
            "body": self.message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification, returning a delivery receipt.
    async fn send_notification(&self, notification: &Notification)
    -> Result<String, NotifyError>;
}

/// Dispatch with bounded retry. A failure here never rolls back the state
/// change that triggered the notification; the terminal error is surfaced
/// to the caller instead.
pub async fn send_with_retry(
    notifier: &dyn Notifier,
    notification: &Notification,
) -> Result<String, NotifyError> {
    let mut backoff = Duration::from_millis(NOTIFY_RETRY_BASE_MS);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match notifier.send_notification(notification).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) if attempt < NOTIFY_RETRY_ATTEMPTS => {
                tracing::warn!(
                    "notify {} attempt {attempt}/{NOTIFY_RETRY_ATTEMPTS} failed: {e}",
                    notification.recipient
                );
                metrics::counter!(observability::NOTIFY_RETRIES_TOTAL).increment(1);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                metrics::counter!(observability::NOTIFY_FAILURES_TOTAL).increment(1);
                return Err(e);
            }
        }
    }
}

/// Broadcast hub with one channel per user. Lets an embedding process (or
/// a test) observe what the engine sends without a real delivery backend.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a user's notifications. Creates the channel if needed.
    pub fn subscribe(&self, user_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Remove a channel (e.g. when a user is deleted).
    pub fn remove(&self, user_id: &Ulid) {
        self.channels.remove(user_id);
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    async fn send_notification(
        &self,
        notification: &Notification,
    ) -> Result<String, NotifyError> {
        // No-op if nobody is listening.
        if let Some(sender) = self.channels.get(&notification.recipient) {
            let _ = sender.send(notification.clone());
        }
        Ok(format!("hub:{}", notification.recipient))
    }
}
