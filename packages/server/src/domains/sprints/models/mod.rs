pub mod entry;
pub mod sprint;

pub use entry::{DailyEntry, ResponseMethod};
pub use sprint::{Sprint, SprintStatus};
