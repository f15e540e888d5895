pub mod errors;
pub mod phone;

pub use errors::EngagementError;
