//! Messenger trait: the abstraction over the outbound messaging API.
//!
//! The bot answers each inbound event exactly once through a reply token.
//! A Messenger takes that token plus an ordered list of outbound messages
//! (text, image, button template) and delivers them in a single call.

use crate::error::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A titled link, as stored in knowledge files and shown as a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAction {
    /// Button caption. `label` is accepted as an alias in knowledge files.
    #[serde(alias = "label")]
    pub title: String,

    /// Target URL
    pub url: String,
}

/// One outbound message object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text reply
    Text { text: String },

    /// An image given by URL; the preview may equal the original.
    Image {
        original_url: String,
        preview_url: String,
    },

    /// A button list of link actions (at most 4 on LINE).
    Buttons {
        title: String,
        text: String,
        actions: Vec<LinkAction>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::Image {
            original_url: url.clone(),
            preview_url: url,
        }
    }
}

/// The ordered list of messages answering one inbound event.
///
/// Always starts with exactly one text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    messages: Vec<OutboundMessage>,
}

impl OutboundPayload {
    /// A payload holding only the text reply.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            messages: vec![OutboundMessage::text(text)],
        }
    }

    /// Append an image or button message after the text reply.
    ///
    /// Text messages are ignored: the payload carries one text, first.
    pub fn push(&mut self, message: OutboundMessage) {
        if !matches!(message, OutboundMessage::Text { .. }) {
            self.messages.push(message);
        }
    }

    /// The text reply.
    pub fn text(&self) -> &str {
        match self.messages.first() {
            Some(OutboundMessage::Text { text }) => text,
            _ => "",
        }
    }

    pub fn messages(&self) -> &[OutboundMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of image messages.
    pub fn image_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m, OutboundMessage::Image { .. }))
            .count()
    }

    /// Whether anything beyond the text reply is attached.
    pub fn has_attachments(&self) -> bool {
        self.messages.len() > 1
    }
}

/// The core Messenger trait.
///
/// Implementations handle platform-specific message formatting and the HTTP
/// call. A failure means nothing was delivered for this call.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Human-readable channel name (e.g., "line").
    fn name(&self) -> &str;

    /// Deliver `messages` in order, answering the event behind `reply_token`.
    async fn send(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> std::result::Result<(), ChannelError>;
}
