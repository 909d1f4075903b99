//! Built-in rules
//!
//! Rules are resolved once at startup into the ordered set the bot runs.

pub mod karma;
pub mod regex;

pub use karma::KarmaRule;
pub use regex::RegexRule;

use std::sync::Arc;

use crate::application::errors::RuleError;
use crate::domain::traits::Rule;
use crate::infrastructure::config::RuleConfig;

/// Build the configured regex rules, in file order, followed by karma.
pub fn from_config(configs: &[RuleConfig]) -> Result<Vec<Arc<dyn Rule>>, RuleError> {
    let mut rules: Vec<Arc<dyn Rule>> = Vec::with_capacity(configs.len() + 1);
    for config in configs {
        tracing::info!("rules: registering {:?}", config.pattern);
        rules.push(Arc::new(RegexRule::from_config(config)?));
    }
    rules.push(Arc::new(KarmaRule));
    Ok(rules)
}
