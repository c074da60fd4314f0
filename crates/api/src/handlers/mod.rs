pub mod deals;
pub mod notifications;
pub mod partner_portal;
pub mod partners;
pub mod stages;
