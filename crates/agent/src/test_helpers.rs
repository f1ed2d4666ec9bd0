//! Shared test helpers for orchestrator tests.

use crate::responder::{Responder, ResponderSettings};
use ragline_core::channel::{Messenger, OutboundMessage};
use ragline_core::error::{ChannelError, ProviderError};
use ragline_core::message::Message;
use ragline_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use ragline_knowledge::{KnowledgeBase, KnowledgeRecord, KnowledgeStore};
use ragline_memory::ConversationMemory;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider that answers with scripted texts in order and records every
/// request it receives. Panics when the script runs out.
pub struct ScriptedProvider {
    answers: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn texts(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let answer = self.answers.get(requests.len()).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more answers (call #{}, have {})",
                requests.len(),
                self.answers.len()
            )
        });
        requests.push(request);
        Ok(make_text_response(&answer))
    }
}

/// Always fails with a server error.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "service unavailable".into(),
        })
    }
}

/// Answers only after sleeping for the given duration.
pub struct SlowProvider(pub Duration);

#[async_trait::async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(make_text_response("too late"))
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Records every send; the first `fail_first` sends are rejected.
pub struct RecordingMessenger {
    fail_first: usize,
    sends: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
}

impl RecordingMessenger {
    pub fn ok() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn failing_first(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            sends: Mutex::new(Vec::new()),
        })
    }

    pub fn sends(&self) -> Vec<(String, Vec<OutboundMessage>)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), ChannelError> {
        let mut sends = self.sends.lock().unwrap();
        sends.push((reply_token.to_string(), messages.to_vec()));
        if sends.len() <= self.fail_first {
            return Err(ChannelError::DeliveryFailed {
                channel: "recording".into(),
                reason: "rejected".into(),
            });
        }
        Ok(())
    }
}

/// Never answers within any sensible send timeout; counts attempts.
pub struct SlowMessenger {
    delay: Duration,
    attempts: Mutex<usize>,
}

impl SlowMessenger {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            attempts: Mutex::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Messenger for SlowMessenger {
    fn name(&self) -> &str {
        "slow"
    }

    async fn send(&self, _reply_token: &str, _messages: &[OutboundMessage]) -> Result<(), ChannelError> {
        *self.attempts.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Two departments; 電機系 carries three images and one link.
pub fn test_knowledge() -> Arc<KnowledgeBase> {
    let store = KnowledgeStore::from_records(vec![
        KnowledgeRecord::from_json(
            "電機系",
            json!({
                "簡介": "電機工程學系",
                "關鍵字": ["老師", "教授"],
                "師資": ["王老師", "李老師"],
                "圖片": [
                    "https://example.edu/ee1.jpg",
                    "https://example.edu/ee2.jpg",
                    "https://example.edu/ee3.jpg"
                ],
                "URL_LINKS": [{"title": "電機系網站", "url": "https://ee.example.edu"}]
            }),
        )
        .unwrap(),
        KnowledgeRecord::from_json(
            "電子系",
            json!({
                "簡介": "電子工程學系",
                "關鍵字": ["半導體"]
            }),
        )
        .unwrap(),
    ]);
    Arc::new(KnowledgeBase::from_store("unused", store))
}

pub fn test_settings() -> ResponderSettings {
    ResponderSettings::default()
}

pub fn responder_with(
    provider: Option<Arc<dyn Provider>>,
    messenger: Arc<RecordingMessenger>,
) -> (Responder, Arc<ConversationMemory>) {
    let memory = Arc::new(ConversationMemory::default());
    let responder = Responder::new(test_knowledge(), memory.clone(), messenger, test_settings())
        .with_provider(provider);
    (responder, memory)
}

/// A second responder over the same knowledge and memory.
pub fn responder_sharing(
    other: &Responder,
    provider: Option<Arc<dyn Provider>>,
    messenger: Arc<RecordingMessenger>,
) -> (Responder, Arc<ConversationMemory>) {
    let memory = other.memory().clone();
    let responder = Responder::new(
        other.knowledge().clone(),
        memory.clone(),
        messenger,
        other.settings().clone(),
    )
    .with_provider(provider);
    (responder, memory)
}
