use std::time::{Duration, Instant};

use shared::domain::{Notification, NotificationKind};
use tokio::sync::Mutex;

/// Single-slot, last-wins notification surface shared by both engines. A new
/// notification replaces whatever is showing; the slot expires lazily once the
/// display duration has passed.
pub struct NotificationSink {
    slot: Mutex<Option<ActiveNotification>>,
    ttl: Duration,
}

struct ActiveNotification {
    notification: Notification,
    raised_at: Instant,
}

impl NotificationSink {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.push(NotificationKind::Success, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.push(NotificationKind::Error, message).await;
    }

    pub async fn push(&self, kind: NotificationKind, message: impl Into<String>) {
        let mut slot = self.slot.lock().await;
        *slot = Some(ActiveNotification {
            notification: Notification::new(kind, message),
            raised_at: Instant::now(),
        });
    }

    /// The currently visible notification, if its display window is still
    /// open. Reading past the TTL clears the slot.
    pub async fn current(&self) -> Option<Notification> {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(active) if active.raised_at.elapsed() < self.ttl => {
                Some(active.notification.clone())
            }
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    pub async fn dismiss(&self) {
        *self.slot.lock().await = None;
    }
}
