//! Command implementations for httpmq-cli

pub mod ack;
pub mod publish;
pub mod ready;
pub mod subscribe;

pub use ack::ack;
pub use publish::publish;
pub use ready::ready;
pub use subscribe::{subscribe, SubscribeOptions};
