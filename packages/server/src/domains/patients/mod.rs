pub mod actions;
pub mod models;
pub mod state_machine;

pub use models::{Patient, PatientState, PendingQuestion, StateTransition, TriggerType};
pub use state_machine::{transition, TransitionUpdates};
