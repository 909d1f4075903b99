//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::application::errors::ConfigError;
use crate::infrastructure::adapters::slack::API_BASE;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub slack: SlackConfig,
    pub memory: MemoryConfig,
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
}

/// Slack credentials. No token means no Slack.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlackConfig {
    pub token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MemoryConfig {
    pub backend: MemoryBackend,
    pub path: Option<PathBuf>,
}

/// A pattern-triggered canned reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleConfig {
    pub pattern: String,
    pub response: String,
    #[serde(default)]
    pub help: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "rulebot".to_string(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: API_BASE.to_string(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::Memory,
            path: None,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Overlay environment values on top of whatever was loaded.
    pub fn apply_env(&mut self, getenv: impl Fn(&str) -> Option<String>) {
        if let Some(name) = getenv("RULEBOT_NAME") {
            self.bot.name = name;
        }

        if let Some(token) = getenv("RULEBOT_SLACK_TOKEN") {
            self.slack.token = Some(token);
        }

        if let Some(path) = getenv("RULEBOT_MEMORY_PATH") {
            self.memory.backend = MemoryBackend::Sqlite;
            self.memory.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.name.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.name".to_string()));
        }
        if self.memory.backend == MemoryBackend::Sqlite && self.memory.path.is_none() {
            return Err(ConfigError::MissingField("memory.path".to_string()));
        }
        for rule in &self.rules {
            if rule.pattern.is_empty() {
                return Err(ConfigError::InvalidValue("rule with empty pattern".to_string()));
            }
        }
        Ok(())
    }

    /// YAML for a default config file, with one example rule.
    pub fn default_yaml() -> Result<String, ConfigError> {
        let mut config = Config::default();
        config.rules.push(RuleConfig {
            pattern: "^ping$".to_string(),
            response: "pong {{.User}}".to_string(),
            help: "ping - check the bot is alive".to_string(),
        });
        serde_yaml::to_string(&config)
            .map_err(|e| ConfigError::Parse(format!("Failed to render config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config = Config::from_yaml("bot:\n  name: bender\n").unwrap();
        assert_eq!(config.bot.name, "bender");
        assert!(config.slack.token.is_none());
        assert_eq!(config.slack.api_url, API_BASE);
        assert_eq!(config.memory.backend, MemoryBackend::Memory);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn rules_and_memory_parse() {
        let yaml = r#"
memory:
  backend: sqlite
  path: brain.db
rules:
  - pattern: "^echo (.+)$"
    response: "$1"
    help: "echo <text> - repeats your message"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.memory.backend, MemoryBackend::Sqlite);
        assert_eq!(config.memory.path, Some(PathBuf::from("brain.db")));
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].response, "$1");
    }

    #[test]
    fn sqlite_without_path_is_rejected() {
        let err = Config::from_yaml("memory:\n  backend: sqlite\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn env_overrides_token_and_memory() {
        let mut config = Config::default();
        config.apply_env(|name| match name {
            "RULEBOT_SLACK_TOKEN" => Some("xoxb-1".to_string()),
            "RULEBOT_MEMORY_PATH" => Some("/tmp/brain.db".to_string()),
            _ => None,
        });
        assert_eq!(config.slack.token.as_deref(), Some("xoxb-1"));
        assert_eq!(config.memory.backend, MemoryBackend::Sqlite);
        assert_eq!(config.bot.name, "rulebot");
    }

    #[test]
    fn default_yaml_round_trips() {
        let yaml = Config::default_yaml().unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.rules.len(), 1);
    }
}
