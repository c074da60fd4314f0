//! Best-effort side effects shared by the mutators.
//!
//! Activity rows and notifications are written after the primary update
//! has committed. Their failures are logged and never returned.

use chrono::Utc;
use dealflow_core::types::{DbId, Timestamp};
use dealflow_db::models::activity::CreateDealActivity;
use dealflow_db::models::notification::CreateNotification;
use dealflow_events::bus::EVENT_NOTIFICATION_CREATED;
use dealflow_events::{DealEvent, EventBus};

use crate::store::DealStore;

/// `updated_at` for a write following `previous`.
///
/// Wall clock, but never earlier than one microsecond past `previous`, so
/// every committed mutation observably advances the timestamp.
pub fn next_timestamp(previous: Timestamp) -> Timestamp {
    let now = Utc::now();
    let floor = previous + chrono::Duration::microseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

pub(crate) async fn record_activity(
    store: &dyn DealStore,
    deal_id: DbId,
    actor_user_id: Option<DbId>,
    action: &'static str,
    details: serde_json::Value,
) {
    let entry = CreateDealActivity {
        deal_id,
        actor_user_id,
        action,
        details,
    };
    if let Err(e) = store.insert_activity(&entry).await {
        tracing::warn!(deal_id, action, error = %e, "Failed to record deal activity");
    }
}

pub(crate) async fn notify(store: &dyn DealStore, events: &EventBus, input: CreateNotification) {
    match store.create_notification(&input).await {
        Ok(notification) => {
            if let Some(deal_id) = notification.deal_id {
                events.publish(
                    DealEvent::new(EVENT_NOTIFICATION_CREATED, deal_id).with_payload(
                        serde_json::json!({
                            "notification_id": notification.id,
                            "user_id": notification.user_id,
                            "title": notification.title,
                        }),
                    ),
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                user_id = input.user_id,
                deal_id = ?input.deal_id,
                error = %e,
                "Failed to create notification"
            );
        }
    }
}
