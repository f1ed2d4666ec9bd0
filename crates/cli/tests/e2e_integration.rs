//! End-to-end integration tests for the RagLine turn pipeline.
//!
//! These tests load real knowledge files from a temporary directory and run
//! whole turns through the orchestrator and the webhook processor, with a
//! scripted provider and a recording messenger standing in for Groq and LINE.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ragline_agent::{Responder, ResponderSettings, TurnOutcome, TurnState, WebhookProcessor};
use ragline_channels::SignatureVerifier;
use ragline_config::AppConfig;
use ragline_core::channel::{Messenger, OutboundMessage};
use ragline_core::error::{ChannelError, ProviderError};
use ragline_core::message::{Message, Role};
use ragline_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use ragline_knowledge::KnowledgeBase;
use ragline_memory::ConversationMemory;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that answers with scripted texts in sequence and keeps
/// every request for inspection.
struct ScriptedProvider {
    answers: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let answer = match self.answers.get(requests.len()) {
            Some(answer) => answer.clone(),
            None => panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                requests.len(),
                self.answers.len()
            ),
        };
        requests.push(request);
        Ok(ProviderResponse {
            message: Message::assistant(answer),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

// ── Mock Messenger ───────────────────────────────────────────────────────

/// Records every send attempt; rejects the first `fail_first` of them.
struct RecordingMessenger {
    fail_first: usize,
    attempts: Mutex<Vec<Vec<OutboundMessage>>>,
}

impl RecordingMessenger {
    fn new(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> Vec<Vec<OutboundMessage>> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "e2e_recording"
    }

    async fn send(&self, _reply_token: &str, messages: &[OutboundMessage]) -> Result<(), ChannelError> {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.push(messages.to_vec());
        if attempts.len() <= self.fail_first {
            return Err(ChannelError::DeliveryFailed {
                channel: "e2e_recording".into(),
                reason: "HTTP 400: Invalid reply token".into(),
            });
        }
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn write_knowledge(dir: &Path) {
    std::fs::write(
        dir.join("ee.json"),
        serde_json::json!({
            "electrical department": {
                "introduction": "The Department of Electrical Engineering was founded in 1970.",
                "faculty": ["Prof. Wang", "Prof. Lee"],
                "關鍵字": ["professor"],
                "圖片": ["https://example.edu/ee/1.jpg", "https://example.edu/ee/2.jpg", "https://example.edu/ee/3.jpg"],
                "URL_LINKS": [
                    {"title": "Department website", "url": "https://ee.example.edu"},
                    {"label": "Faculty list and office hours", "url": "https://ee.example.edu/faculty"}
                ]
            }
        })
        .to_string(),
    )
    .unwrap();

    std::fs::create_dir_all(dir.join("more")).unwrap();
    std::fs::write(
        dir.join("more").join("ec.json"),
        serde_json::json!({
            "電子系": {
                "簡介": "電子工程學系",
                "關鍵字": {"研究": ["半導體", "積體電路"]}
            }
        })
        .to_string(),
    )
    .unwrap();

    std::fs::write(dir.join("broken.json"), "{ this is not json").unwrap();
}

struct Harness {
    _dir: tempfile::TempDir,
    responder: Arc<Responder>,
    memory: Arc<ConversationMemory>,
}

fn harness(provider: Option<Arc<dyn Provider>>, messenger: Arc<RecordingMessenger>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    write_knowledge(dir.path());

    let mut config = AppConfig::default();
    config.knowledge.dir = dir.path().to_path_buf();

    let (knowledge, report) = KnowledgeBase::load(&config.knowledge.dir);
    assert_eq!(report.records, 2);
    assert_eq!(report.files_skipped, 1);

    let memory = Arc::new(ConversationMemory::new(config.conversation.history_char_budget));
    let responder = Responder::new(
        Arc::new(knowledge),
        memory.clone(),
        messenger,
        ResponderSettings::from_config(&config),
    )
    .with_provider(provider);

    Harness {
        _dir: dir,
        responder: Arc::new(responder),
        memory,
    }
}

// ── E2E: Grounding without a provider ────────────────────────────────────

#[tokio::test]
async fn e2e_electrical_department_professor_offline() {
    let h = harness(None, RecordingMessenger::new(0));

    let reply = h
        .responder
        .respond("U-offline", "electrical department professor")
        .await;

    assert_eq!(reply.retrieval.matched_topics, vec!["electrical department"]);
    assert!(reply
        .retrieval
        .reference_text
        .contains("[introduction]: The Department of Electrical Engineering was founded in 1970."));
    assert!(reply.retrieval.reference_text.contains("[faculty]: Prof. Wang\nProf. Lee"));
    assert!(!reply.retrieval.reference_text.contains("關鍵字"));

    assert_eq!(reply.outcome, TurnOutcome::Offline);
    assert_eq!(reply.payload.text(), AppConfig::default().reply.offline_reply);
    assert_eq!(reply.payload.len(), 1);

    assert!(h.memory.recent("U-offline", 8).is_empty());
    assert_eq!(h.memory.user_count(), 0);
}

#[tokio::test]
async fn e2e_categorized_keywords_in_nested_file_match() {
    let h = harness(None, RecordingMessenger::new(0));
    let reply = h.responder.respond("U1", "想了解 積體 電路").await;
    assert_eq!(reply.retrieval.matched_topics, vec!["電子系"]);
}

// ── E2E: Conversation memory across turns ────────────────────────────────

#[tokio::test]
async fn e2e_second_turn_prompt_carries_first_exchange() {
    let provider = ScriptedProvider::new(&["It has two professors.", "Prof. Wang teaches circuits."]);
    let h = harness(Some(provider.clone()), RecordingMessenger::new(0));

    let first = h
        .responder
        .handle_turn("U-memory", "token-1", "electrical department professor")
        .await;
    let second = h
        .responder
        .handle_turn("U-memory", "token-2", "what does the first one teach?")
        .await;
    assert_eq!(first, TurnState::Done);
    assert_eq!(second, TurnState::Done);

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);

    let first_prompt = &requests[0].messages;
    assert_eq!(first_prompt.len(), 2);

    let second_prompt: Vec<(Role, &str)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(second_prompt[0].0, Role::System);
    assert_eq!(
        &second_prompt[1..],
        &[
            (Role::User, "electrical department professor"),
            (Role::Assistant, "It has two professors."),
            (Role::User, "what does the first one teach?"),
        ]
    );

    assert_eq!(h.memory.len("U-memory"), 4);
}

// ── E2E: Delivery retry ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_rejected_payload_retries_with_text_only() {
    let messenger = RecordingMessenger::new(1);
    let provider = ScriptedProvider::new(&["Here is the department."]);
    let h = harness(Some(provider), messenger.clone());

    let state = h
        .responder
        .handle_turn("U-retry", "token", "electrical department")
        .await;
    assert_eq!(state, TurnState::Done);

    let attempts = messenger.attempts();
    assert_eq!(attempts.len(), 2);

    // text + 2 images + 1 buttons message
    assert_eq!(attempts[0].len(), 4);
    match &attempts[0][3] {
        OutboundMessage::Buttons { actions, .. } => {
            assert_eq!(actions.len(), 2);
            assert_eq!(actions[1].title, "Faculty list and off");
        }
        other => panic!("expected buttons, got {other:?}"),
    }

    let notice = &AppConfig::default().reply.partial_delivery_notice;
    assert_eq!(
        attempts[1],
        vec![OutboundMessage::text(format!("{notice}\nHere is the department."))]
    );
}

#[tokio::test]
async fn e2e_failed_retry_makes_no_third_attempt() {
    let messenger = RecordingMessenger::new(usize::MAX);
    let provider = ScriptedProvider::new(&["Here is the department."]);
    let h = harness(Some(provider), messenger.clone());

    let state = h
        .responder
        .handle_turn("U-dead", "token", "electrical department")
        .await;

    assert_eq!(state, TurnState::DeliveryFailed);
    assert_eq!(messenger.attempts().len(), 2);
    // The completion itself succeeded, so the exchange is remembered.
    assert_eq!(h.memory.len("U-dead"), 2);
}

// ── E2E: Signed webhook ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_signed_webhook_round_trip() {
    let messenger = RecordingMessenger::new(0);
    let provider = ScriptedProvider::new(&["電子系專攻半導體。"]);
    let h = harness(Some(provider), messenger.clone());

    let verifier = SignatureVerifier::new(Some("e2e-secret"));
    let processor = WebhookProcessor::new(h.responder.clone(), verifier.clone());

    let body = serde_json::json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": "reply-1",
            "source": {"type": "group", "groupId": "G-1"},
            "message": {"type": "text", "id": "9", "text": "半導體"}
        }]
    })
    .to_string();
    let signature = verifier.sign(body.as_bytes()).unwrap();

    let outcome = processor.process(body.as_bytes(), Some(signature.as_str())).await;
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.turns, vec![TurnState::Done]);
    assert_eq!(
        messenger.attempts(),
        vec![vec![OutboundMessage::text("電子系專攻半導體。")]]
    );
    assert_eq!(h.memory.len("G-1"), 2);

    let tampered = processor.process(b"{\"events\":[]}", Some(signature.as_str())).await;
    assert_eq!(tampered.status, 400);
}

// ── E2E: Reload ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_reload_picks_up_new_topics() {
    let h = harness(None, RecordingMessenger::new(0));
    let knowledge = h.responder.knowledge().clone();

    assert!(h.responder.respond("U1", "化工系").await.retrieval.matched_topics.is_empty());

    std::fs::write(
        knowledge.dir().join("che.json"),
        r#"{"化工系": {"簡介": "化學工程學系"}}"#,
    )
    .unwrap();
    let report = knowledge.reload().await;
    assert_eq!(report.records, 3);

    let reply = h.responder.respond("U1", "化工系").await;
    assert_eq!(reply.retrieval.matched_topics, vec!["化工系"]);
}
