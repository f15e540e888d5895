pub mod fallback;
pub mod pipeline;

pub use pipeline::{
    classify, route, ClassificationAction, ClassificationOutcome, ACCEPT_THRESHOLD,
    CLARIFY_THRESHOLD,
};
