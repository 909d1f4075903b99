//! rulebot - routes chat messages between a live transport and a rule set

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod rules;

pub use application::errors::{BotError, RuleError, StorageError, TransportError};
pub use application::messaging::{Bot, BotBuilder};
pub use domain::entities::Message;
pub use domain::traits::{Memory, Rule, Transport};
