//! Deal workflow event bus and outbound delivery.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DealEvent`] -- the event envelope published by workflow mutators,
//!   the release gate, and the scoring worker.
//! - [`EventPersistence`] -- bus consumer that stores every event in
//!   `deal_events`.
//! - [`delivery`] -- external delivery channels (partner email).

pub mod bus;
pub mod delivery;
pub mod persistence;

pub use bus::{DealEvent, EventBus};
pub use persistence::EventPersistence;
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError, ReleaseEmail};
