pub mod models;

pub use models::{DailyEntry, ResponseMethod, Sprint, SprintStatus};
