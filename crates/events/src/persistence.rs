//! Writes every bus event to the `deal_events` table.
//!
//! [`EventPersistence::run`] is spawned once at startup with its own
//! subscription and exits when the bus is dropped.

use dealflow_core::types::DbId;
use dealflow_db::models::event::CreateDealEvent;
use dealflow_db::repositories::EventRepo;
use dealflow_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::DealEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Persist events until the channel closes.
    ///
    /// A failed insert is logged and the loop moves on; a lagging receiver
    /// logs how many events it missed.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<DealEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            deal_id = event.deal_id,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event persistence lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence stopping");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &DealEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &CreateDealEvent {
                event_type: &event.event_type,
                deal_id: event.deal_id,
                actor_user_id: event.actor_user_id,
                payload: &event.payload,
                occurred_at: event.timestamp,
            },
        )
        .await
    }
}
