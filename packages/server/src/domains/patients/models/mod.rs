pub mod patient;
pub mod transition;

pub use patient::{Patient, PatientState, PendingQuestion};
pub use transition::{StateTransition, TriggerType};
