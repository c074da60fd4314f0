//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for inserts and filtered listing

pub mod activity;
pub mod deal;
pub mod event;
pub mod notification;
pub mod partner;
pub mod release;
