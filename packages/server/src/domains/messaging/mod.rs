pub mod inbound;

pub use inbound::{handle_inbound, InboundSms};
