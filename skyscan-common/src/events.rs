//! Event types for the SkyScan event system
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// How long a client should show a notification before dismissing it
pub const NOTIFICATION_DISMISS_MS: u64 = 3000;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// SkyScan event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SkyScanEvent {
    /// Transient, auto-dismissing user notification
    Notification {
        kind: NotificationKind,
        message: String,
        /// Client-side display duration
        dismiss_after_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A displayed image moved to a new upload state
    UploadStateChanged {
        image_id: Uuid,
        file_name: String,
        /// Upload state label ("pending", "in_flight", "succeeded", "failed")
        state: String,
        timestamp: DateTime<Utc>,
    },

    /// A report (and its image links) was committed
    ReportGenerated {
        report_id: String,
        image_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl SkyScanEvent {
    /// Build a success notification
    pub fn success(message: impl Into<String>) -> Self {
        Self::notification(NotificationKind::Success, message)
    }

    /// Build an error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self::notification(NotificationKind::Error, message)
    }

    fn notification(kind: NotificationKind, message: impl Into<String>) -> Self {
        SkyScanEvent::Notification {
            kind,
            message: message.into(),
            dismiss_after_ms: NOTIFICATION_DISMISS_MS,
            timestamp: Utc::now(),
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            SkyScanEvent::Notification { .. } => "Notification",
            SkyScanEvent::UploadStateChanged { .. } => "UploadStateChanged",
            SkyScanEvent::ReportGenerated { .. } => "ReportGenerated",
        }
    }
}

/// Broadcast channel for [`SkyScanEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SkyScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    ///
    /// ```
    /// use skyscan_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SkyScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SkyScanEvent,
    ) -> Result<usize, broadcast::error::SendError<SkyScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SkyScanEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_serialization() {
        let event = SkyScanEvent::success("Successfully uploaded harbor.png");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Notification");
        assert_eq!(json["kind"], "success");
        assert_eq!(json["message"], "Successfully uploaded harbor.png");
        assert_eq!(json["dismiss_after_ms"], 3000);
        assert_eq!(event.event_type(), "Notification");
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(SkyScanEvent::error("nobody listening")).is_err());
        // Lossy emit must not panic
        bus.emit_lossy(SkyScanEvent::error("nobody listening"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(SkyScanEvent::success("first")).unwrap();
        bus.emit(SkyScanEvent::error("second")).unwrap();

        match rx.recv().await.unwrap() {
            SkyScanEvent::Notification { kind, message, .. } => {
                assert_eq!(kind, NotificationKind::Success);
                assert_eq!(message, "first");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            SkyScanEvent::Notification { kind, .. } => assert_eq!(kind, NotificationKind::Error),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
