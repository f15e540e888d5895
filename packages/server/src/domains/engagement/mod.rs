pub mod dispatcher;
pub mod handlers;
pub mod prompts;

pub use dispatcher::{run_tick, DispatchSummary, BATCH_SIZE};
