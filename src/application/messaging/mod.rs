//! Message handling - Fan inbound messages out to rules, replies back out

pub mod dispatcher;
pub mod task;

pub use dispatcher::{Bot, BotBuilder};
pub use task::spawn_supervised;
