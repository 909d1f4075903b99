//! Transport plumbing shared by the chat backends

pub mod connection;
pub mod frames;

pub use connection::{
    Connection, ConnectionOptions, ConnectionState, Connector, FrameSocket, Session,
};
