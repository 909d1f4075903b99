//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage / Database: memory backends
//! - Transport: the connection lifecycle shared by chat backends
//! - Adapters: Platform integrations (Slack, console)

pub mod config;
pub mod storage;
pub mod database;
pub mod transport;
pub mod adapters;
