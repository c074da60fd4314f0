//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`DealEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use dealflow_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const EVENT_DEAL_CREATED: &str = "deal.created";
pub const EVENT_STAGE_CHANGED: &str = "deal.stage_changed";
pub const EVENT_HANDOFF_CHANGED: &str = "deal.handoff_changed";
pub const EVENT_NOTES_UPDATED: &str = "deal.notes_updated";
pub const EVENT_DEAL_RELEASED: &str = "deal.released";
pub const EVENT_RELEASE_ENGAGEMENT: &str = "release.engagement_changed";
pub const EVENT_SCORING_QUEUED: &str = "deal.scoring_queued";
pub const EVENT_DEAL_SCORED: &str = "deal.scored";
pub const EVENT_SCORING_FAILED: &str = "deal.scoring_failed";
pub const EVENT_NOTIFICATION_CREATED: &str = "notification.created";

// ---------------------------------------------------------------------------
// DealEvent
// ---------------------------------------------------------------------------

/// Something that happened to a deal.
///
/// Constructed via [`DealEvent::new`] and enriched with
/// [`with_actor`](DealEvent::with_actor) and
/// [`with_payload`](DealEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealEvent {
    /// Dot-separated event name, e.g. `"deal.stage_changed"`.
    pub event_type: String,

    /// The deal the event concerns.
    pub deal_id: DbId,

    /// Optional id of the user that triggered the event.
    pub actor_user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DealEvent {
    pub fn new(event_type: impl Into<String>, deal_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            deal_id,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting user to the event.
    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use dealflow_events::bus::{DealEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(DealEvent::new("deal.created", 1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<DealEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: DealEvent) {
        tracing::debug!(event_type = %event.event_type, deal_id = event.deal_id, "Publishing event");
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DealEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            DealEvent::new(EVENT_STAGE_CHANGED, 42)
                .with_actor(7)
                .with_payload(serde_json::json!({"from": "draft", "to": "qualified"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_STAGE_CHANGED);
        assert_eq!(received.deal_id, 42);
        assert_eq!(received.actor_user_id, Some(7));
        assert_eq!(received.payload["to"], "qualified");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DealEvent::new(EVENT_DEAL_RELEASED, 3));

        assert_eq!(rx1.recv().await.unwrap().event_type, EVENT_DEAL_RELEASED);
        assert_eq!(rx2.recv().await.unwrap().event_type, EVENT_DEAL_RELEASED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DealEvent::new("orphan.event", 1));
    }

    #[test]
    fn default_event_has_empty_payload() {
        let event = DealEvent::new(EVENT_DEAL_CREATED, 5);
        assert!(event.actor_user_id.is_none());
        assert!(event.payload.is_object());
    }
}
