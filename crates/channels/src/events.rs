//! LINE webhook envelope.
//!
//! Only the fields the bot acts on are modelled; everything else in the
//! payload is ignored. Reference shape:
//!
//! ```json
//! {
//!   "destination": "U…",
//!   "events": [{
//!     "type": "message",
//!     "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
//!     "source": {"type": "user", "userId": "U4af4980629…"},
//!     "message": {"type": "text", "id": "444573844083572737", "text": "電機系老師"}
//!   }]
//! }
//! ```

use ragline_core::error::ChannelError;
use serde::Deserialize;

/// User key for events whose source carries no identifier.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

impl EventSource {
    /// The memory key: user, then group, then room.
    pub fn user_key(&self) -> Option<&str> {
        [&self.user_id, &self.group_id, &self.room_id]
            .into_iter()
            .filter_map(|id| id.as_deref())
            .find(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message the bot should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub reply_token: String,
    pub user_id: String,
    pub text: String,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(body).map_err(|e| ChannelError::InvalidPayload(e.to_string()))
    }

    /// Text-message events that carry a reply token, in payload order.
    pub fn text_messages(&self) -> Vec<InboundText> {
        self.events.iter().filter_map(WebhookEvent::as_text).collect()
    }
}

impl WebhookEvent {
    pub fn as_text(&self) -> Option<InboundText> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        let reply_token = self.reply_token.as_deref().filter(|t| !t.is_empty())?;
        let text = message.text.as_deref()?;
        let user_id = self
            .source
            .as_ref()
            .and_then(EventSource::user_key)
            .unwrap_or(ANONYMOUS_USER);

        Some(InboundText {
            reply_token: reply_token.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
        })
    }
}
