//! Domain traits - Capabilities the core consumes but does not implement

pub mod memory;
pub mod rule;
pub mod transport;

pub use memory::Memory;
pub use rule::{Rule, RuleSet};
pub use transport::Transport;
