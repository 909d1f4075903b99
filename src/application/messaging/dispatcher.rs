//! Message dispatcher - Routes inbound messages through the rule set

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::application::errors::{BotError, RuleError, StorageError};
use crate::domain::entities::Message;
use crate::domain::traits::{Memory, Rule, RuleSet, Transport};
use super::task::spawn_supervised;

/// Header line of the help reply.
const HELP_HEADER: &str = "available commands:\n";

/// Start-once guard owned by a single bot instance.
struct Lifecycle {
    started: bool,
    inbound: Option<mpsc::Receiver<Message>>,
}

struct Inner {
    name: String,
    rules: RuleSet,
    memory: Arc<dyn Memory>,
    outbound: mpsc::Sender<Message>,
    lifecycle: Mutex<Lifecycle>,
}

/// The bot identity plus the wiring between a transport and its rules.
///
/// Cloning is cheap; clones share the same identity, rules and channels.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<Inner>,
}

/// Builder for [`Bot`]. Rules are fixed once `build` is called.
pub struct BotBuilder {
    name: String,
    memory: Arc<dyn Memory>,
    rules: Vec<Arc<dyn Rule>>,
    inbound: Option<mpsc::Receiver<Message>>,
    outbound: Option<mpsc::Sender<Message>>,
}

impl BotBuilder {
    /// Register a rule. Registration order is evaluation and help order.
    pub fn with_rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Wire the bot to a transport's channels.
    pub fn with_transport(mut self, transport: &dyn Transport) -> Result<Self, BotError> {
        let inbound = transport.inbound_channel().ok_or(BotError::InboundTaken)?;
        self.inbound = Some(inbound);
        self.outbound = Some(transport.outbound_channel());
        Ok(self)
    }

    /// Wire the bot to raw channels.
    pub fn with_channels(
        mut self,
        inbound: mpsc::Receiver<Message>,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        self.inbound = Some(inbound);
        self.outbound = Some(outbound);
        self
    }

    pub fn build(self) -> Result<Bot, BotError> {
        let (Some(inbound), Some(outbound)) = (self.inbound, self.outbound) else {
            return Err(BotError::Internal("bot built without a transport".to_string()));
        };

        tracing::info!("bot: {} rules registered for {}", self.rules.len(), self.name);

        Ok(Bot {
            inner: Arc::new(Inner {
                name: self.name,
                rules: self.rules.into(),
                memory: self.memory,
                outbound,
                lifecycle: Mutex::new(Lifecycle {
                    started: false,
                    inbound: Some(inbound),
                }),
            }),
        })
    }
}

impl Bot {
    pub fn builder(name: impl Into<String>, memory: Arc<dyn Memory>) -> BotBuilder {
        BotBuilder {
            name: name.into(),
            memory,
            rules: Vec::new(),
            inbound: None,
            outbound: None,
        }
    }

    /// Bot name, used to recognise the help command.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Read an arbitrary value from the bot's memory.
    pub async fn memory_read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.memory.read(namespace, key).await
    }

    /// Save an arbitrary value to the bot's memory.
    pub async fn memory_save(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), StorageError> {
        self.inner.memory.save(namespace, key, value).await
    }

    /// Channel the transport drains and sends over the wire.
    pub fn outbound_channel(&self) -> mpsc::Sender<Message> {
        self.inner.outbound.clone()
    }

    /// Concatenated help text of every rule, in registration order.
    pub fn help_text(&self) -> String {
        let mut help = HELP_HEADER.to_string();
        for rule in self.inner.rules.iter() {
            help.push_str(&rule.help_message(self));
            help.push('\n');
        }
        help
    }

    /// Consume inbound messages, one supervised task per message.
    ///
    /// Only the first call on a bot runs the loop; later calls return
    /// immediately. The loop ends when the inbound channel closes.
    pub async fn process(&self) {
        let Some(mut inbound) = self.begin() else {
            tracing::debug!("bot: main loop already started");
            return;
        };

        tracing::info!("bot: starting main loop");
        while let Some(message) = inbound.recv().await {
            let bot = self.clone();
            if self.is_help_request(&message) {
                spawn_supervised("help", async move { bot.answer_help(message).await });
            } else {
                spawn_supervised("rules", async move { bot.run_rules(message).await });
            }
        }
        tracing::info!("bot: inbound channel closed, main loop stopped");
    }

    /// Run the main loop until the transport stops feeding it.
    ///
    /// A transport that stopped because it could not connect is reported
    /// as an error; a clean end of input is not.
    pub async fn serve(&self, transport: &dyn Transport) -> Result<(), BotError> {
        self.process().await;
        match transport.last_error() {
            Some(e) => Err(BotError::Transport(e)),
            None => Ok(()),
        }
    }

    fn begin(&self) -> Option<mpsc::Receiver<Message>> {
        let mut lifecycle = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if lifecycle.started {
            return None;
        }
        lifecycle.started = true;
        lifecycle.inbound.take()
    }

    fn is_help_request(&self, message: &Message) -> bool {
        message.text.starts_with(&format!("{} help", self.inner.name))
    }

    async fn answer_help(&self, message: Message) -> Result<(), RuleError> {
        let reply = message.reply(self.help_text());
        self.forward(reply).await
    }

    async fn run_rules(&self, message: Message) -> Result<(), RuleError> {
        for rule in self.inner.rules.iter() {
            let replies = rule.parse_message(self, &message).await.map_err(|e| {
                tracing::warn!(room = %message.room, "rule failed on {:?}: {}", message.text, e);
                e
            })?;
            for reply in replies {
                self.forward(reply).await?;
            }
        }
        Ok(())
    }

    async fn forward(&self, message: Message) -> Result<(), RuleError> {
        self.inner
            .outbound
            .send(message)
            .await
            .map_err(|_| RuleError::OutboundClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStore;

    fn bot() -> Bot {
        let (_in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, _out_rx) = mpsc::channel(1);
        Bot::builder("bender", Arc::new(InMemoryStore::new()))
            .with_channels(in_rx, out_tx)
            .build()
            .expect("bot")
    }

    #[test]
    fn help_prefix_must_name_the_bot() {
        let bot = bot();
        assert!(bot.is_help_request(&Message::new("C1", "bender help")));
        assert!(bot.is_help_request(&Message::new("C1", "bender help me")));
        assert!(!bot.is_help_request(&Message::new("C1", "help")));
        assert!(!bot.is_help_request(&Message::new("C1", "hey bender help")));
    }

    #[test]
    fn help_without_rules_is_just_the_header() {
        assert_eq!(bot().help_text(), "available commands:\n");
    }

    #[test]
    fn build_requires_channels() {
        let result = Bot::builder("bender", Arc::new(InMemoryStore::new())).build();
        assert!(matches!(result, Err(BotError::Internal(_))));
    }
}
