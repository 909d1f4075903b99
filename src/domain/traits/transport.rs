use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::Message;

/// Transport trait - a live connection to a chat backend seen as two channels
pub trait Transport: Send + Sync {
    /// Messages decoded from the backend.
    ///
    /// There is exactly one consumer: the first call hands the receiver over
    /// and later calls return `None`.
    fn inbound_channel(&self) -> Option<mpsc::Receiver<Message>>;

    /// Messages to encode and send to the backend.
    fn outbound_channel(&self) -> mpsc::Sender<Message>;

    /// The most recent handshake or dial failure. Never cleared.
    fn last_error(&self) -> Option<TransportError>;
}
