//! Connection lifecycle - handshake, dial, intake, dispatch and reconnect
//!
//! One `Connection` owns one live socket to a chat backend. Three loops run
//! against it once connected:
//!
//! - intake decodes frames into inbound messages
//! - dispatch renders outbound messages into frames, one per send interval
//! - the supervisor probes liveness and re-runs handshake + dial on failure
//!
//! The socket handle is swapped under a short lock and the replaced socket is
//! closed. Loops snapshot it and do their I/O on the snapshot, so one
//! in-flight read or write per reconnect may still hit the stale handle; the
//! close makes that operation end, and its failure is swallowed by the loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::Message;
use crate::domain::traits::Transport;
use super::frames::{render_text, InboundFrame, OutboundFrame, MAX_FRAME_BYTES, PROBE_FRAME};

/// A persistent, bidirectional, text-framed socket.
#[async_trait]
pub trait FrameSocket: Send + Sync {
    /// Read the next frame. `Ok(None)` once the peer has closed.
    async fn read_frame(&self) -> Result<Option<String>, TransportError>;

    async fn write_frame(&self, frame: &str) -> Result<(), TransportError>;

    /// Shut the socket down. A pending `read_frame` must return `Ok(None)`.
    async fn close(&self);
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub url: String,
    pub self_id: String,
}

/// Backend-specific half of a connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Obtain a session URL and the bot's own wire identity.
    async fn handshake(&self) -> Result<Session, TransportError>;

    /// Open the persistent socket for a session URL.
    async fn dial(&self, url: &str) -> Result<Arc<dyn FrameSocket>, TransportError>;

    /// Look up a user's display name.
    async fn lookup_user(&self, user_id: &str) -> Result<String, TransportError>;

    /// Mention syntax substituted for the `{{.User}}` placeholder.
    fn mention(&self, user_id: &str) -> String {
        format!("<@{}>", user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Dialing,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Period between liveness probes.
    pub reconnect_interval: Duration,
    /// Pause after each successful outbound write. Applies to the whole
    /// connection, not per room.
    pub send_interval: Duration,
    pub max_frame_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(1),
            send_interval: Duration::from_secs(1),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

struct Shared<C> {
    connector: C,
    options: ConnectionOptions,
    socket: Mutex<Option<Arc<dyn FrameSocket>>>,
    self_id: Mutex<String>,
    usernames: Mutex<HashMap<String, String>>,
    last_error: Mutex<Option<TransportError>>,
    state: Mutex<ConnectionState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Connector> Shared<C> {
    fn socket(&self) -> Option<Arc<dyn FrameSocket>> {
        lock(&self.socket).clone()
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    fn fail(&self, error: TransportError) -> TransportError {
        tracing::warn!("connection: {}", error);
        *lock(&self.last_error) = Some(error.clone());
        let state = if self.socket().is_some() {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Disconnected
        };
        self.set_state(state);
        error
    }

    /// Handshake then dial. A handshake failure skips the dial.
    async fn connect(&self) -> Result<(), TransportError> {
        self.set_state(ConnectionState::Handshaking);
        tracing::info!("connection: handshaking");
        let session = self.connector.handshake().await.map_err(|e| self.fail(e))?;
        *lock(&self.self_id) = session.self_id.clone();

        self.set_state(ConnectionState::Dialing);
        tracing::info!("connection: dialing {}", session.url);
        let socket = self.connector.dial(&session.url).await.map_err(|e| self.fail(e))?;
        let replaced = lock(&self.socket).replace(socket);

        self.set_state(ConnectionState::Connected);
        tracing::info!("connection: connected as {}", session.self_id);

        if let Some(stale) = replaced {
            tracing::debug!("connection: closing replaced socket");
            stale.close().await;
        }
        Ok(())
    }

    async fn resolve_display_name(&self, user_id: &str) -> String {
        let cached = lock(&self.usernames).get(user_id).cloned();
        if let Some(name) = cached {
            return name;
        }

        tracing::debug!("connection: reading username for {}", user_id);
        match self.connector.lookup_user(user_id).await {
            Ok(name) => {
                lock(&self.usernames).insert(user_id.to_string(), name.clone());
                tracing::debug!("connection: {} is {}", user_id, name);
                name
            }
            Err(e) => {
                tracing::warn!(
                    "connection: failed reading username for {} - returning blank: {}",
                    user_id,
                    e
                );
                String::new()
            }
        }
    }

    /// Render, encode and write one message. True when a frame went out.
    async fn send_message(&self, message: &Message) -> bool {
        let mention = self.connector.mention(&message.to_user_id);
        let Some(text) = render_text(&message.text, &mention) else {
            tracing::debug!(room = %message.room, "dropping blank outbound message");
            return false;
        };

        let self_id = lock(&self.self_id).clone();
        let Some(frame) = OutboundFrame::new(&self_id, &message.room, &text)
            .encode(self.options.max_frame_bytes)
        else {
            return false;
        };

        let Some(socket) = self.socket() else {
            return false;
        };
        match socket.write_frame(&frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(room = %message.room, "outbound write failed: {}", e);
                false
            }
        }
    }
}

async fn intake_loop<C: Connector>(shared: Arc<Shared<C>>, inbound: mpsc::Sender<Message>) {
    tracing::info!("connection: started message intake loop");
    loop {
        let Some(socket) = shared.socket() else {
            tokio::time::sleep(shared.options.reconnect_interval).await;
            continue;
        };

        let raw = match socket.read_frame().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                // Peer closed; wait for the supervisor to swap the handle.
                tokio::time::sleep(shared.options.reconnect_interval).await;
                continue;
            }
            Err(e) => {
                tracing::debug!("connection: unreadable frame: {}", e);
                tokio::time::sleep(shared.options.reconnect_interval).await;
                continue;
            }
        };

        let Some(frame) = InboundFrame::decode(&raw) else {
            continue;
        };
        let name = shared.resolve_display_name(&frame.user_id).await;
        if inbound.send(frame.into_message(name)).await.is_err() {
            tracing::info!("connection: inbound channel closed, stopping intake");
            return;
        }
    }
}

async fn dispatch_loop<C: Connector>(
    shared: Arc<Shared<C>>,
    mut outbound: mpsc::Receiver<Message>,
) {
    tracing::info!("connection: started message dispatch loop");
    while let Some(message) = outbound.recv().await {
        if shared.send_message(&message).await {
            tokio::time::sleep(shared.options.send_interval).await;
        }
    }
    tracing::info!("connection: outbound channel closed, stopping dispatch");
}

async fn supervise<C: Connector>(shared: Arc<Shared<C>>) {
    loop {
        tokio::time::sleep(shared.options.reconnect_interval).await;

        let Some(socket) = shared.socket() else {
            tracing::error!("connection: no socket, cannot reconnect");
            return;
        };

        if let Err(e) = socket.write_frame(PROBE_FRAME).await {
            tracing::info!("connection: reconnecting ({})", e);
            shared.set_state(ConnectionState::Reconnecting);
            if let Err(e) = shared.connect().await {
                tracing::warn!("connection: reconnect attempt failed: {}", e);
            }
        }
    }
}

/// A self-healing connection exposed as a [`Transport`].
pub struct Connection<C: Connector> {
    shared: Arc<Shared<C>>,
    inbound: Mutex<Option<mpsc::Receiver<Message>>>,
    outbound: mpsc::Sender<Message>,
}

impl<C: Connector> Connection<C> {
    pub async fn open(connector: C) -> Self {
        Self::open_with(connector, ConnectionOptions::default()).await
    }

    /// Connect and start the loops.
    ///
    /// Never fails outright: a failed handshake or dial is kept in
    /// `last_error`. Intake and dispatch only start when the first attempt
    /// succeeded; the supervisor always starts and gives up at once if there
    /// is no socket to probe.
    pub async fn open_with(connector: C, options: ConnectionOptions) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);

        let shared = Arc::new(Shared {
            connector,
            options,
            socket: Mutex::new(None),
            self_id: Mutex::new(String::new()),
            usernames: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
        });

        if shared.connect().await.is_ok() {
            tokio::spawn(intake_loop(shared.clone(), inbound_tx));
            tokio::spawn(dispatch_loop(shared.clone(), outbound_rx));
        }
        tokio::spawn(supervise(shared.clone()));

        Self {
            shared,
            inbound: Mutex::new(Some(inbound_rx)),
            outbound: outbound_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    /// The bot's own wire identity, empty until a handshake succeeds.
    pub fn self_id(&self) -> String {
        lock(&self.shared.self_id).clone()
    }

    /// Display name for a user id, cached after the first successful lookup.
    ///
    /// Failed lookups return an empty name and are retried next time.
    /// Concurrent misses for the same id may each hit the backend.
    pub async fn resolve_display_name(&self, user_id: &str) -> String {
        self.shared.resolve_display_name(user_id).await
    }
}

impl<C: Connector> Transport for Connection<C> {
    fn inbound_channel(&self) -> Option<mpsc::Receiver<Message>> {
        lock(&self.inbound).take()
    }

    fn outbound_channel(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }

    fn last_error(&self) -> Option<TransportError> {
        lock(&self.shared.last_error).clone()
    }
}
