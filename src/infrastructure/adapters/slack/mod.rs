//! Slack RTM adapter

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::errors::TransportError;
use crate::infrastructure::config::SlackConfig;
use crate::infrastructure::transport::{
    Connection, ConnectionOptions, Connector, FrameSocket, Session,
};

/// Slack Web API base URL
pub const API_BASE: &str = "https://slack.com/api/";

/// Upper bound on the close handshake with a peer that may be gone.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A Slack connection: the generic lifecycle over [`SlackConnector`].
pub type SlackTransport = Connection<SlackConnector>;

/// Slack handshake, dial and user lookup.
pub struct SlackConnector {
    token: String,
    api_base: String,
    client: Client,
}

impl SlackConnector {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: API_BASE.to_string(),
            client: Client::new(),
        }
    }

    /// Point the Web API calls somewhere else.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build a connector when a token is configured.
    pub fn from_config(config: &SlackConfig) -> Option<Self> {
        let token = config.token.as_deref().filter(|t| !t.trim().is_empty())?;
        Some(Self::new(token).with_api_base(config.api_url.clone()))
    }

    /// Handshake, dial and start the loops.
    pub async fn connect(self) -> SlackTransport {
        Connection::open_with(self, ConnectionOptions::default()).await
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), method)
    }
}

/// `ok` must be a JSON `true`; anything else is a rejection.
fn check_ok(ok: &serde_json::Value, error: Option<&str>, call: &str) -> Result<(), TransportError> {
    match ok {
        serde_json::Value::Bool(true) => Ok(()),
        _ => Err(TransportError::Rejected(format!(
            "{}: {}",
            call,
            error.unwrap_or("not ok")
        ))),
    }
}

#[async_trait]
impl Connector for SlackConnector {
    async fn handshake(&self) -> Result<Session, TransportError> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            ok: serde_json::Value,
            error: Option<String>,
            #[serde(default)]
            url: String,
            #[serde(rename = "self")]
            me: Option<SelfInfo>,
        }

        #[derive(Deserialize)]
        struct SelfInfo {
            id: String,
        }

        tracing::info!("slack: connecting to HTTP API handshake interface");
        let response = self
            .client
            .get(self.api_url("rtm.start"))
            .query(&[
                ("no_unreads", "true"),
                ("simple_latest", "true"),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Handshake(format!(
                "Slack API error: {}",
                response.status()
            )));
        }

        let data: Response = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        check_ok(&data.ok, data.error.as_deref(), "rtm.start")?;

        let self_id = data.me.map(|me| me.id).unwrap_or_default();
        if data.url.is_empty() || self_id.is_empty() {
            return Err(TransportError::Parse(
                "rtm.start response lacks url or self id".to_string(),
            ));
        }

        Ok(Session { url: data.url, self_id })
    }

    async fn dial(&self, url: &str) -> Result<Arc<dyn FrameSocket>, TransportError> {
        tracing::info!("slack: dialing RTM websocket");
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Dial(e.to_string()))?;
        Ok(Arc::new(WsSocket::new(ws)))
    }

    async fn lookup_user(&self, user_id: &str) -> Result<String, TransportError> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            ok: serde_json::Value,
            error: Option<String>,
            user: Option<UserInfo>,
        }

        #[derive(Deserialize)]
        struct UserInfo {
            name: String,
        }

        let response = self
            .client
            .get(self.api_url("users.info"))
            .query(&[("token", self.token.as_str()), ("user", user_id)])
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let data: Response = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        check_ok(&data.ok, data.error.as_deref(), "users.info")?;

        data.user
            .map(|u| u.name)
            .ok_or_else(|| TransportError::Parse("users.info response lacks user".to_string()))
    }
}

/// Websocket split into independently locked halves, so a blocked read
/// never holds up a write.
pub struct WsSocket {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl WsSocket {
    fn new(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: watch::Sender::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Resolves once `close` has been called.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

async fn next_text(stream: &mut SplitStream<WsStream>) -> Result<Option<String>, TransportError> {
    loop {
        match stream.next().await {
            None | Some(Ok(WsMessage::Close(_))) => return Ok(None),
            Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_str().to_owned())),
            // ping, pong and binary frames carry nothing for us
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
            Some(Err(e)) => return Err(TransportError::Network(e.to_string())),
        }
    }
}

#[async_trait]
impl FrameSocket for WsSocket {
    async fn read_frame(&self) -> Result<Option<String>, TransportError> {
        let closed = self.closed.subscribe();
        if self.is_closed() {
            return Ok(None);
        }
        let mut stream = self.stream.lock().await;
        tokio::select! {
            _ = wait_closed(closed) => Ok(None),
            frame = next_text(&mut stream) => frame,
        }
    }

    async fn write_frame(&self, frame: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(frame.to_owned().into()))
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        let closing = async { self.sink.lock().await.close().await };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("slack: websocket close failed: {}", e),
            Err(_) => tracing::debug!("slack: websocket close timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_must_be_boolean_true() {
        assert!(check_ok(&serde_json::json!(true), None, "x").is_ok());
        assert!(check_ok(&serde_json::json!(false), None, "x").is_err());
        assert!(check_ok(&serde_json::json!("true"), None, "x").is_err());
        assert!(check_ok(&serde_json::Value::Null, None, "x").is_err());
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let connector = SlackConnector::new("xoxb-1").with_api_base("http://localhost:1234/");
        assert_eq!(connector.api_url("rtm.start"), "http://localhost:1234/rtm.start");
        assert_eq!(
            SlackConnector::new("t").api_url("users.info"),
            "https://slack.com/api/users.info"
        );
    }

    #[test]
    fn missing_token_disables_slack() {
        let mut config = SlackConfig::default();
        assert!(SlackConnector::from_config(&config).is_none());

        config.token = Some("  ".to_string());
        assert!(SlackConnector::from_config(&config).is_none());

        config.token = Some("xoxb-1".to_string());
        assert!(SlackConnector::from_config(&config).is_some());
    }
}
