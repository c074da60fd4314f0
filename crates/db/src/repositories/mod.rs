//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod access_log_repo;
pub mod activity_repo;
pub mod deal_repo;
pub mod event_repo;
pub mod notification_repo;
pub mod partner_repo;
pub mod release_repo;

pub use access_log_repo::AccessLogRepo;
pub use activity_repo::ActivityRepo;
pub use deal_repo::DealRepo;
pub use event_repo::EventRepo;
pub use notification_repo::NotificationRepo;
pub use partner_repo::PartnerRepo;
pub use release_repo::ReleaseRepo;
