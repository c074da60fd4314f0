//! Deal workflow domain logic.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! repository layer, the workflow service, and the HTTP boundary:
//!
//! - [`stage`] -- stage taxonomy and transition rules.
//! - [`deal`] -- handoff, release, and scoring enums plus field validation.
//! - [`roles`] -- role names and the explicit [`roles::Caller`] context.
//! - [`error`] -- the shared [`error::CoreError`] taxonomy.

#[macro_use]
mod macros;

pub mod deal;
pub mod error;
pub mod roles;
pub mod search;
pub mod stage;
pub mod types;
