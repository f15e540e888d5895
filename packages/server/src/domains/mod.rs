pub mod classification;
pub mod engagement;
pub mod messaging;
pub mod patients;
pub mod sprints;
