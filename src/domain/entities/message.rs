/// A chat event travelling between a transport and the rule set.
///
/// Inbound messages are built by a transport from a decoded frame; outbound
/// ones are built by rules. Neither side mutates a message after handing it
/// over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub room: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub to_user_id: String,
    pub to_user_name: String,
    pub text: String,
    /// True when the conversation is a private one-to-one.
    pub direct: bool,
}

impl Message {
    pub fn new(room: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn from_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_user_id = id.into();
        self.from_user_name = name.into();
        self
    }

    pub fn to_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.to_user_id = id.into();
        self.to_user_name = name.into();
        self
    }

    pub fn with_direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    /// Build a reply addressed to this message's sender, in the same room.
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Message::new(self.room.clone(), text)
            .to_user(self.from_user_id.clone(), self.from_user_name.clone())
            .with_direct(self.direct)
    }
}
