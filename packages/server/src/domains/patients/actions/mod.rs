pub mod enroll;

pub use enroll::enroll;
