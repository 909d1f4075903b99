//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Errors: Domain-specific errors
//! - Messaging: the dispatcher that connects a transport to the rule set

pub mod errors;
pub mod messaging;
