//! Webhook processing, independent of any HTTP framework.
//!
//! The HTTP layer hands over the raw body and the signature header and gets
//! back a status code. Turns for all text events in one delivery run
//! concurrently; their outcomes never change the status.

use crate::responder::{Responder, TurnState};
use futures::future::join_all;
use ragline_channels::{SignatureVerifier, WebhookEnvelope};
use std::sync::Arc;
use tracing::{debug, warn};

/// Status answered to LINE, plus what happened to each text event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub status: u16,
    pub turns: Vec<TurnState>,
}

impl WebhookOutcome {
    fn rejected() -> Self {
        Self {
            status: 400,
            turns: Vec::new(),
        }
    }
}

pub struct WebhookProcessor {
    responder: Arc<Responder>,
    verifier: SignatureVerifier,
}

impl WebhookProcessor {
    pub fn new(responder: Arc<Responder>, verifier: SignatureVerifier) -> Self {
        Self { responder, verifier }
    }

    pub fn responder(&self) -> &Arc<Responder> {
        &self.responder
    }

    pub async fn process(&self, body: &[u8], signature: Option<&str>) -> WebhookOutcome {
        if let Err(e) = self.verifier.verify(body, signature) {
            warn!(error = %e, "Rejecting webhook");
            return WebhookOutcome::rejected();
        }

        let envelope = match WebhookEnvelope::parse(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Rejecting webhook");
                return WebhookOutcome::rejected();
            }
        };

        let texts = envelope.text_messages();
        debug!(
            events = envelope.events.len(),
            texts = texts.len(),
            "Webhook accepted"
        );

        let turns = join_all(texts.iter().map(|t| {
            self.responder
                .handle_turn(&t.user_id, &t.reply_token, &t.text)
        }))
        .await;

        WebhookOutcome { status: 200, turns }
    }
}
