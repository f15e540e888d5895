//! Postgres-backed scheduled job queue.
//!
//! `job.rs` holds the job model and the atomic skip-locked claim;
//! `scheduler.rs` holds the producer side (timezone-aware recurrence,
//! jitter, cancellation) and the completion/retry resolution.

pub mod job;
pub mod scheduler;

pub use job::{JobStatus, JobType, ScheduledJob};
pub use scheduler::{
    cancel_all, next_occurrence, schedule_one_shot, schedule_recurring, with_jitter,
};
