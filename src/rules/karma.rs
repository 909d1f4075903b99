use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::application::errors::RuleError;
use crate::application::messaging::Bot;
use crate::domain::entities::Message;
use crate::domain::traits::Rule;

const NAMESPACE: &str = "karma";

static KARMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+?)(\+\+|--)\s*$").expect("karma pattern"));

/// `thing++` / `thing--` counters kept in the bot's memory.
pub struct KarmaRule;

fn parse_count(raw: &[u8]) -> i64 {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn parse_adjustment(text: &str) -> Option<(String, i64)> {
    let caps = KARMA.captures(text)?;
    let delta = if &caps[2] == "++" { 1 } else { -1 };
    Some((caps[1].to_lowercase(), delta))
}

#[async_trait]
impl Rule for KarmaRule {
    async fn parse_message(
        &self,
        bot: &Bot,
        message: &Message,
    ) -> Result<Vec<Message>, RuleError> {
        let Some((subject, delta)) = parse_adjustment(&message.text) else {
            return Ok(Vec::new());
        };

        let current = parse_count(&bot.memory_read(NAMESPACE, &subject).await?);
        let updated = current + delta;
        bot.memory_save(NAMESPACE, &subject, updated.to_string().as_bytes())
            .await?;

        Ok(vec![message.reply(format!("{} now has {} karma", subject, updated))])
    }

    fn help_message(&self, _bot: &Bot) -> String {
        "<thing>++ or <thing>-- - adjust karma".to_string()
    }
}
