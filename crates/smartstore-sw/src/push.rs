//! Push subscriptions and platform notifications.
//!
//! The push payload contract is plain UTF-8 text. There is no structured
//! schema: a missing or undecodable payload degrades to the configured
//! default body.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Opaque handle to a platform push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Platform-assigned endpoint.
    pub endpoint: String,
}

/// Owns the presence or absence of the push subscription.
///
/// The platform owns the subscription itself; the application only observes
/// subscribed vs not and requests creation or destruction.
#[derive(Debug, Default)]
pub struct PushManager {
    subscription: Option<PushSubscription>,
}

impl PushManager {
    /// Create an unsubscribed manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a subscription. Returns the existing one if already present.
    pub fn subscribe(&mut self, endpoint: impl Into<String>) -> &PushSubscription {
        self.subscription.get_or_insert_with(|| {
            let subscription = PushSubscription {
                endpoint: endpoint.into(),
            };
            info!(endpoint = %subscription.endpoint, "push subscription created");
            subscription
        })
    }

    /// Destroy the subscription. Returns whether one existed.
    pub fn unsubscribe(&mut self) -> bool {
        let existed = self.subscription.take().is_some();
        if existed {
            info!("push subscription destroyed");
        }
        existed
    }

    /// The current subscription, if any.
    pub fn get(&self) -> Option<&PushSubscription> {
        self.subscription.as_ref()
    }

    /// Whether a subscription exists.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

/// Decode a push payload as UTF-8 text, falling back to `default_body`.
pub fn decode_payload(payload: Option<&[u8]>, default_body: &str) -> String {
    match payload {
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                debug!("push payload was not UTF-8, using default body");
                default_body.to_string()
            }
        },
        None => default_body.to_string(),
    }
}

/// Unique identifier for a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A platform notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Fixed title.
    pub title: String,

    /// Body text, decoded from the push payload.
    pub body: String,

    /// Icon path.
    pub icon: String,

    /// Badge path.
    pub badge: String,

    /// Page opened or focused when clicked.
    pub click_target: String,
}

/// Platform notification surface.
///
/// Display and click side effects have no return channel to the
/// application; failures here are logged and otherwise unobservable.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: HashMap<NotificationId, Notification>,
}

impl NotificationCenter {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a notification.
    pub fn show(&mut self, notification: Notification) -> NotificationId {
        let id = NotificationId::new();
        info!(title = %notification.title, body = %notification.body, "notification shown");
        self.shown.insert(id, notification);
        id
    }

    /// Close a displayed notification. Returns whether it was showing.
    pub fn close(&mut self, id: NotificationId) -> bool {
        self.shown.remove(&id).is_some()
    }

    /// A displayed notification.
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.shown.get(&id)
    }

    /// Number of notifications currently showing.
    pub fn len(&self) -> usize {
        self.shown.len()
    }

    /// Whether nothing is showing.
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut manager = PushManager::new();
        assert!(!manager.is_subscribed());

        let endpoint = manager.subscribe("https://push.example/abc").endpoint.clone();
        let again = manager.subscribe("https://push.example/other").endpoint.clone();

        assert_eq!(endpoint, again);
        assert!(manager.is_subscribed());
    }

    #[test]
    fn test_unsubscribe() {
        let mut manager = PushManager::new();
        manager.subscribe("https://push.example/abc");

        assert!(manager.unsubscribe());
        assert!(!manager.is_subscribed());
        assert!(!manager.unsubscribe());
        assert!(manager.get().is_none());
    }

    #[test]
    fn test_decode_payload_text() {
        assert_eq!(decode_payload(Some(b"Low stock: oat milk"), "default"), "Low stock: oat milk");
    }

    #[test]
    fn test_decode_payload_missing_or_invalid() {
        assert_eq!(decode_payload(None, "default"), "default");
        assert_eq!(decode_payload(Some(&[0xff, 0xfe]), "default"), "default");
    }

    #[test]
    fn test_notification_show_close() {
        let mut center = NotificationCenter::new();
        let id = center.show(Notification {
            title: "SmartStore Alert".to_string(),
            body: "hello".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            click_target: "/dashboard".to_string(),
        });

        assert_eq!(center.len(), 1);
        assert!(center.close(id));
        assert!(center.is_empty());
        assert!(!center.close(id));
    }
}
