//! LINE reply-API messenger.
//!
//! Sends one `POST /v2/bot/message/reply` per call with the reply token and
//! the ordered message objects. LINE consumes the token on the first
//! successful call, so callers get exactly one delivery per inbound event.

use async_trait::async_trait;
use ragline_config::LineConfig;
use ragline_core::channel::{Messenger, OutboundMessage};
use ragline_core::error::ChannelError;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const CHANNEL: &str = "line";

pub struct LineMessenger {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for LineMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineMessenger")
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LineMessenger {
    pub fn new(
        api_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            timeout,
        })
    }

    pub fn from_config(config: &LineConfig) -> Result<Self, ChannelError> {
        Self::new(
            &config.api_url,
            config.channel_access_token.clone(),
            Duration::from_secs(config.send_timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    fn reply_url(&self) -> String {
        format!("{}/v2/bot/message/reply", self.api_url)
    }
}

/// LINE Messaging API form of one outbound message.
pub fn to_line_json(message: &OutboundMessage) -> Value {
    match message {
        OutboundMessage::Text { text } => json!({
            "type": "text",
            "text": text,
        }),
        OutboundMessage::Image {
            original_url,
            preview_url,
        } => json!({
            "type": "image",
            "originalContentUrl": original_url,
            "previewImageUrl": preview_url,
        }),
        OutboundMessage::Buttons {
            title,
            text,
            actions,
        } => json!({
            "type": "template",
            "altText": title,
            "template": {
                "type": "buttons",
                "title": title,
                "text": text,
                "actions": actions
                    .iter()
                    .map(|a| json!({"type": "uri", "label": a.title, "uri": a.url}))
                    .collect::<Vec<_>>(),
            },
        }),
    }
}

#[async_trait]
impl Messenger for LineMessenger {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), ChannelError> {
        let Some(token) = &self.access_token else {
            return Err(ChannelError::NotConfigured(
                "CHANNEL_ACCESS_TOKEN is not set".into(),
            ));
        };

        let body = json!({
            "replyToken": reply_token,
            "messages": messages.iter().map(to_line_json).collect::<Vec<_>>(),
        });

        debug!(messages = messages.len(), "Sending LINE reply");

        let response = self
            .client
            .post(self.reply_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChannelError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ChannelError::DeliveryFailed {
                        channel: CHANNEL.into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %detail, "LINE reply rejected");
            return Err(ChannelError::DeliveryFailed {
                channel: CHANNEL.into(),
                reason: format!("HTTP {}: {detail}", status.as_u16()),
            });
        }

        Ok(())
    }
}
