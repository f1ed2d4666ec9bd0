//! Response orchestrator.
//!
//! Drives one inbound text through its states:
//!
//! ```text
//! Received → Matching → Grounded → Completing ─┬─ Succeeded → Replying → Done
//!                                               └─ Failed → RepliedWithFallback → Done
//!                                    any reply that cannot be delivered → DeliveryFailed
//! ```
//!
//! Knowledge and memory operations are infallible. Provider and messenger
//! errors stop here: they become fallback text or a logged terminal state.

use crate::payload::PayloadFormatter;
use crate::prompt::build_messages;
use ragline_config::{AppConfig, ReplyConfig};
use ragline_core::channel::{Messenger, OutboundPayload};
use ragline_core::error::{ChannelError, ProviderError};
use ragline_core::message::ConversationTurn;
use ragline_core::provider::{Provider, ProviderRequest};
use ragline_knowledge::{ContextAssembler, KnowledgeBase, RetrievalResult};
use ragline_memory::ConversationMemory;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Per-event lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    Matching,
    Grounded,
    Completing,
    Succeeded,
    Failed,
    Replying,
    RepliedWithFallback,
    Done,
    DeliveryFailed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Done | TurnState::DeliveryFailed)
    }
}

/// How the text of a reply was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The provider answered; the exchange was remembered.
    Answered,
    /// No provider is configured.
    Offline,
    /// The provider failed, timed out or returned nothing.
    Fallback { reason: String },
}

impl TurnOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, TurnOutcome::Answered)
    }
}

/// The result of [`Responder::respond`]: what to send, and why.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub payload: OutboundPayload,
    pub outcome: TurnOutcome,
    pub retrieval: RetrievalResult,
}

/// Static knobs of the orchestrator.
#[derive(Debug, Clone)]
pub struct ResponderSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub completion_timeout: Duration,
    pub send_timeout: Duration,
    pub history_window: usize,
    pub max_reference_chars: usize,
    pub reply: ReplyConfig,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ResponderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: Some(config.provider.max_tokens).filter(|&t| t > 0),
            completion_timeout: Duration::from_secs(config.provider.timeout_secs),
            send_timeout: Duration::from_secs(config.line.send_timeout_secs),
            history_window: config.conversation.history_window,
            max_reference_chars: config.knowledge.max_reference_chars,
            reply: config.reply.clone(),
        }
    }
}

pub struct Responder {
    knowledge: Arc<KnowledgeBase>,
    memory: Arc<ConversationMemory>,
    provider: Option<Arc<dyn Provider>>,
    messenger: Arc<dyn Messenger>,
    assembler: ContextAssembler,
    formatter: PayloadFormatter,
    settings: ResponderSettings,
}

impl Responder {
    /// A responder without a completion provider. Every question gets the
    /// offline reply until [`with_provider`](Self::with_provider) is used.
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        memory: Arc<ConversationMemory>,
        messenger: Arc<dyn Messenger>,
        settings: ResponderSettings,
    ) -> Self {
        Self {
            knowledge,
            memory,
            provider: None,
            messenger,
            assembler: ContextAssembler::new(settings.max_reference_chars),
            formatter: PayloadFormatter::from_config(&settings.reply),
            settings,
        }
    }

    pub fn with_provider(mut self, provider: Option<Arc<dyn Provider>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn settings(&self) -> &ResponderSettings {
        &self.settings
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Answer one question without sending anything.
    pub async fn respond(&self, user_id: &str, text: &str) -> TurnReply {
        let text = text.trim();

        debug!(state = ?TurnState::Matching, "Turn state");
        let snapshot = self.knowledge.snapshot();
        let retrieval = self.assembler.assemble(text, &snapshot);
        drop(snapshot);

        debug!(
            state = ?TurnState::Grounded,
            matched = ?retrieval.matched_topics,
            grounded = retrieval.is_grounded(),
            "Turn state"
        );

        let Some(provider) = &self.provider else {
            debug!(state = ?TurnState::Failed, reason = "no provider", "Turn state");
            return TurnReply {
                payload: self.formatter.text(&self.settings.reply.offline_reply),
                outcome: TurnOutcome::Offline,
                retrieval,
            };
        };

        let history = self
            .memory
            .recent(user_id, self.settings.history_window);
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: build_messages(&self.settings.reply.persona, &retrieval, &history, text),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        debug!(
            state = ?TurnState::Completing,
            provider = provider.name(),
            history = history.len(),
            "Turn state"
        );

        match self.complete(provider.as_ref(), request).await {
            Ok(answer) => {
                self.memory.record_exchange(
                    user_id,
                    ConversationTurn::user(text),
                    ConversationTurn::assistant(answer.as_str()),
                );
                debug!(state = ?TurnState::Succeeded, chars = answer.chars().count(), "Turn state");
                TurnReply {
                    payload: self.formatter.answer(&answer, &retrieval),
                    outcome: TurnOutcome::Answered,
                    retrieval,
                }
            }
            Err(e) => {
                warn!(error = %e, "Completion failed, replying with fallback");
                debug!(state = ?TurnState::Failed, "Turn state");
                TurnReply {
                    payload: self.formatter.text(&self.settings.reply.fallback_reply),
                    outcome: TurnOutcome::Fallback {
                        reason: e.to_string(),
                    },
                    retrieval,
                }
            }
        }
    }

    /// One bounded completion call. Blank answers count as failures.
    async fn complete(
        &self,
        provider: &dyn Provider,
        request: ProviderRequest,
    ) -> Result<String, ProviderError> {
        let timeout = self.settings.completion_timeout;
        let response = tokio::time::timeout(timeout, provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("no completion after {}s", timeout.as_secs()))
            })??;

        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }
        Ok(answer)
    }

    /// Send `payload`, falling back once to a notice-prefixed text.
    ///
    /// Every failed first send gets exactly one retry, whether or not the
    /// payload carried images or buttons. Returns [`TurnState::Done`] or
    /// [`TurnState::DeliveryFailed`].
    pub async fn deliver(&self, reply_token: &str, payload: &OutboundPayload) -> TurnState {
        debug!(state = ?TurnState::Replying, messages = payload.len(), "Turn state");

        let first = match self.send(reply_token, payload).await {
            Ok(()) => return TurnState::Done,
            Err(e) => e,
        };

        warn!(error = %first, "Reply rejected, retrying with text only");
        let retry = self.formatter.partial_retry(payload);
        match self.send(reply_token, &retry).await {
            Ok(()) => TurnState::Done,
            Err(e) => {
                error!(first = %first, retry = %e, "Reply delivery failed after text-only retry");
                TurnState::DeliveryFailed
            }
        }
    }

    async fn send(&self, reply_token: &str, payload: &OutboundPayload) -> Result<(), ChannelError> {
        let timeout = self.settings.send_timeout;
        tokio::time::timeout(timeout, self.messenger.send(reply_token, payload.messages()))
            .await
            .map_err(|_| ChannelError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    /// Full turn for one webhook event, inside a span carrying a `turn_id`.
    pub async fn handle_turn(&self, user_id: &str, reply_token: &str, text: &str) -> TurnState {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", %turn_id, user_id);

        async {
            debug!(state = ?TurnState::Received, "Turn state");
            let reply = self.respond(user_id, text).await;

            let state = self.deliver(reply_token, &reply.payload).await;
            let state = match (state, reply.outcome.is_answered()) {
                (TurnState::Done, false) => {
                    debug!(state = ?TurnState::RepliedWithFallback, "Turn state");
                    TurnState::Done
                }
                (state, _) => state,
            };

            info!(
                state = ?state,
                outcome = ?reply.outcome,
                matched = reply.retrieval.matched_topics.len(),
                messages = reply.payload.len(),
                "Turn finished"
            );
            state
        }
        .instrument(span)
        .await
    }
}
