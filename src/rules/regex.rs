use async_trait::async_trait;
use regex_lite::Regex;

use crate::application::errors::RuleError;
use crate::application::messaging::Bot;
use crate::domain::entities::Message;
use crate::domain::traits::Rule;
use crate::infrastructure::config::RuleConfig;

/// Replies to the sender whenever the message text matches.
///
/// `$1`, `${name}` and friends in the response expand to capture groups.
/// A `{{.User}}` placeholder is left for the transport to turn into a
/// mention.
pub struct RegexRule {
    pattern: Regex,
    response: String,
    help: String,
}

impl RegexRule {
    pub fn new(
        pattern: &str,
        response: impl Into<String>,
        help: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let pattern = Regex::new(pattern).map_err(|e| RuleError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            pattern,
            response: response.into(),
            help: help.into(),
        })
    }

    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleError> {
        Self::new(&config.pattern, config.response.clone(), config.help.clone())
    }
}

#[async_trait]
impl Rule for RegexRule {
    async fn parse_message(
        &self,
        _bot: &Bot,
        message: &Message,
    ) -> Result<Vec<Message>, RuleError> {
        let Some(caps) = self.pattern.captures(&message.text) else {
            return Ok(Vec::new());
        };
        let mut text = String::new();
        caps.expand(&self.response, &mut text);
        Ok(vec![message.reply(text)])
    }

    fn help_message(&self, _bot: &Bot) -> String {
        if self.help.is_empty() {
            self.pattern.as_str().to_string()
        } else {
            self.help.clone()
        }
    }
}
