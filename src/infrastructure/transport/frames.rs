//! Wire frames exchanged over the persistent socket

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::entities::Message;

/// Frame type carrying chat text.
pub const MESSAGE_TYPE: &str = "message";

/// Hard cap on an encoded outbound frame.
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

/// Liveness probe written by the reconnect supervisor.
pub const PROBE_FRAME: &str = r#"{"type":"hello"}"#;

/// Channel ids of private conversations start with this prefix.
pub const DIRECT_PREFIX: &str = "D";

static USER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.User\s*\}\}").expect("placeholder pattern"));

#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(rename = "user", default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

impl InboundFrame {
    /// Decode a raw frame, keeping only chat messages.
    pub fn decode(raw: &str) -> Option<Self> {
        let frame: InboundFrame = serde_json::from_str(raw).ok()?;
        (frame.kind == MESSAGE_TYPE).then_some(frame)
    }

    pub fn is_direct(&self) -> bool {
        self.channel.starts_with(DIRECT_PREFIX)
    }

    /// Translate into a message once the sender's display name is known.
    pub fn into_message(self, from_user_name: String) -> Message {
        let direct = self.is_direct();
        Message::new(self.channel, self.text)
            .from_user(self.user_id, from_user_name)
            .with_direct(direct)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user: &'a str,
    pub channel: &'a str,
    pub text: &'a str,
}

impl<'a> OutboundFrame<'a> {
    pub fn new(self_id: &'a str, channel: &'a str, text: &'a str) -> Self {
        Self {
            kind: MESSAGE_TYPE,
            user: self_id,
            channel,
            text,
        }
    }

    /// Serialize, refusing anything over `max_bytes`.
    pub fn encode(&self, max_bytes: usize) -> Option<String> {
        let encoded = serde_json::to_string(self).ok()?;
        if encoded.len() > max_bytes {
            tracing::debug!("dropping outbound frame of {} bytes", encoded.len());
            return None;
        }
        Some(encoded)
    }
}

/// Substitute the `{{.User}}` placeholder with `mention`, then undo HTML
/// escaping. Returns `None` when nothing but whitespace is left.
pub fn render_text(text: &str, mention: &str) -> Option<String> {
    let substituted = USER_PLACEHOLDER.replace_all(text, regex_lite::NoExpand(mention));
    let rendered = html_escape::decode_html_entities(&substituted).into_owned();
    if rendered.trim().is_empty() {
        None
    } else {
        Some(rendered)
    }
}
