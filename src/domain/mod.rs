//! Domain layer - Core chat objects with no I/O
//! 
//! This layer contains:
//! - Entities: the wire-agnostic Message
//! - Traits: capabilities supplied from outside (Rule, Memory, Transport)

pub mod entities;
pub mod traits;
