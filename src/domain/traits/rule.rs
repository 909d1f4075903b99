use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::RuleError;
use crate::application::messaging::Bot;
use crate::domain::entities::Message;

/// Rule trait - pluggable handler mapping one inbound message to replies
#[async_trait]
pub trait Rule: Send + Sync {
    /// Produce zero or more outbound messages for `message`.
    ///
    /// Replies are forwarded in the order returned. An `Err` aborts the rest
    /// of the evaluation for this message only.
    async fn parse_message(&self, bot: &Bot, message: &Message) -> Result<Vec<Message>, RuleError>;

    /// Human-readable description shown by `<bot name> help`.
    fn help_message(&self, bot: &Bot) -> String;
}

/// Ordered, immutable rule sequence fixed at bot construction.
pub type RuleSet = Arc<[Arc<dyn Rule>]>;
