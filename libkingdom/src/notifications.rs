//! User-visible notifications
//!
//! Every mutating operation reports its outcome through a [`Notifier`].
//! Delivery is fire-and-forget: failures are logged, never surfaced to the
//! caller of the operation.
//!
//! # Example
//!
//! ```no_run
//! use libkingdom::notifications::{Notification, NotificationBus, Notifier};
//!
//! # async fn example() {
//! let bus = NotificationBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.send_local_notification(Notification::new("Account connected", "@grace on Instagram"))
//!     .await
//!     .ok();
//!
//! if let Ok(notification) = receiver.recv().await {
//!     println!("{}: {}", notification.title, notification.body);
//! }
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::Result;

/// A local notification shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Structured payload for the UI (e.g., results, post ids)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_local_notification(&self, notification: Notification) -> Result<()>;
}

/// Deliver a notification, logging instead of propagating failures
pub(crate) async fn fire(notifier: &dyn Notifier, notification: Notification) {
    let title = notification.title.clone();
    if let Err(e) = notifier.send_local_notification(notification).await {
        warn!("Failed to deliver notification '{}': {}", title, e);
    }
}

/// Receiver type alias
pub type NotificationReceiver = broadcast::Receiver<Notification>;

/// Broadcast-backed notifier for in-process subscribers
///
/// If nobody is subscribed, notifications are dropped. Lagging subscribers
/// lose the oldest notifications first.
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// `capacity` is the per-subscriber buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl Notifier for NotificationBus {
    async fn send_local_notification(&self, notification: Notification) -> Result<()> {
        // send() only fails when there are no receivers
        let _ = self.sender.send(notification);
        Ok(())
    }
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_local_notification(&self, notification: Notification) -> Result<()> {
        info!(id = %notification.id, "{}: {}", notification.title, notification.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KingdomError, StorageError};

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn send_local_notification(&self, _notification: Notification) -> Result<()> {
            Err(KingdomError::Storage(StorageError::Remote(
                "push service down".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn test_bus_delivers_to_all_subscribers() {
        let bus = NotificationBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.send_local_notification(Notification::new("Posted", "2/2 platforms"))
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().body, "2/2 platforms");
        assert_eq!(second.recv().await.unwrap().title, "Posted");
    }

    #[tokio::test]
    async fn test_bus_without_subscribers() {
        let bus = NotificationBus::new(10);
        assert!(bus
            .send_local_notification(Notification::new("Posted", "nobody listening"))
            .await
            .is_ok());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_fire_swallows_failures() {
        // Must not panic or propagate
        fire(&BrokenNotifier, Notification::new("Posted", "body")).await;
    }

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::new("Scheduled", "Post scheduled")
            .with_data(serde_json::json!({ "scheduled_post_id": "abc" }));

        let json = serde_json::to_string(&notification).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notification);
        assert_eq!(back.data["scheduled_post_id"], "abc");
    }
}
