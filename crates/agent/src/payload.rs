//! Outbound payload formatting.

use ragline_config::ReplyConfig;
use ragline_core::channel::{LinkAction, OutboundMessage, OutboundPayload};
use ragline_knowledge::RetrievalResult;

/// LINE's limit for one text message.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Buttons templates accept at most four actions.
const MAX_BUTTON_ACTIONS: usize = 4;

/// Shapes answers into LINE-sized payloads.
#[derive(Debug, Clone)]
pub struct PayloadFormatter {
    max_images: usize,
    max_links: usize,
    max_label_chars: usize,
    links_title: String,
    links_text: String,
    attach_media: bool,
    partial_delivery_notice: String,
}

impl PayloadFormatter {
    pub fn from_config(reply: &ReplyConfig) -> Self {
        Self {
            max_images: reply.max_images,
            max_links: reply.max_links.min(MAX_BUTTON_ACTIONS),
            max_label_chars: reply.max_label_chars.max(1),
            links_title: reply.links_title.clone(),
            links_text: reply.links_text.clone(),
            attach_media: reply.attach_media,
            partial_delivery_notice: reply.partial_delivery_notice.clone(),
        }
    }

    /// Text reply only, e.g. for fallback sentences.
    pub fn text(&self, text: &str) -> OutboundPayload {
        OutboundPayload::text_only(truncate_chars(text.trim(), MAX_TEXT_CHARS))
    }

    /// Text reply, then images, then a single link-button message.
    pub fn answer(&self, text: &str, retrieval: &RetrievalResult) -> OutboundPayload {
        let mut payload = self.text(text);
        if !self.attach_media {
            return payload;
        }

        if let Some(images) = &retrieval.images {
            for url in images.iter().take(self.max_images) {
                payload.push(OutboundMessage::image(url.as_str()));
            }
        }

        if let Some(links) = &retrieval.links {
            let actions: Vec<LinkAction> = links
                .iter()
                .take(self.max_links)
                .map(|link| LinkAction {
                    title: truncate_chars(&link.title, self.max_label_chars),
                    url: link.url.clone(),
                })
                .collect();
            if !actions.is_empty() {
                payload.push(OutboundMessage::Buttons {
                    title: self.links_title.clone(),
                    text: self.links_text.clone(),
                    actions,
                });
            }
        }

        payload
    }

    /// The text-only retry after a rejected full payload.
    pub fn partial_retry(&self, payload: &OutboundPayload) -> OutboundPayload {
        let text = format!("{}\n{}", self.partial_delivery_notice, payload.text());
        OutboundPayload::text_only(truncate_chars(&text, MAX_TEXT_CHARS))
    }
}

/// First `max` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
