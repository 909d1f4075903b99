//! Platform adapters

pub mod console;
pub mod slack;

pub use console::ConsoleTransport;
pub use slack::{SlackConnector, SlackTransport};
