//! HTTP gateway for RagLine.
//!
//! Routes:
//!
//! - `POST /callback`: LINE webhook (raw body + `X-Line-Signature`)
//! - `GET /health`: liveness plus knowledge record count
//! - `POST /test_press`: load-test hook, only when enabled in config
//!
//! Built on Axum. All turn logic lives in `ragline-agent`; handlers only
//! translate HTTP to and from it. On Unix, `SIGHUP` reloads the knowledge
//! directory without a restart.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use ragline_agent::{Responder, ResponderSettings, WebhookProcessor};
use ragline_channels::{LineMessenger, SignatureVerifier};
use ragline_config::AppConfig;
use ragline_knowledge::KnowledgeBase;
use ragline_memory::ConversationMemory;

const SIGNATURE_HEADER: &str = "x-line-signature";

/// Question used by `/test_press` when the body names none.
const DEFAULT_PRESS_TEXT: &str = "電機系老師";

/// Characters of the answer echoed by `/test_press`.
const PRESS_PREVIEW_CHARS: usize = 10;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub processor: WebhookProcessor,
    pub enable_test_endpoint: bool,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/callback", post(callback_handler));

    if state.enable_test_endpoint {
        router = router.route("/test_press", post(test_press_handler));
    }

    router
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire knowledge, memory, provider and messenger into a [`Responder`].
pub fn build_responder(config: &AppConfig) -> Result<Responder, Box<dyn std::error::Error>> {
    let (knowledge, _) = KnowledgeBase::load(&config.knowledge.dir);
    let memory = ConversationMemory::new(config.conversation.history_char_budget);
    let provider = ragline_providers::build_from_config(&config.provider);
    let messenger = LineMessenger::from_config(&config.line)?;

    if !messenger.is_configured() {
        warn!("CHANNEL_ACCESS_TOKEN is not set, replies cannot be delivered");
    }

    Ok(Responder::new(
        Arc::new(knowledge),
        Arc::new(memory),
        Arc::new(messenger),
        ResponderSettings::from_config(config),
    )
    .with_provider(provider))
}

/// Build the shared state: signature policy plus a wired [`Responder`].
///
/// Refuses to build without a channel secret unless
/// `line.skip_signature_verification` is set.
pub fn build_state(config: &AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    let verifier = SignatureVerifier::from_config(&config.line);
    if verifier.accepts_unsigned() {
        warn!("line.skip_signature_verification is set, webhook signatures are NOT verified");
    } else if !verifier.is_enabled() {
        return Err("CHANNEL_SECRET is not set; refusing to accept unsigned webhooks \
             (set line.skip_signature_verification = true for local testing)"
            .into());
    }

    let responder = Arc::new(build_responder(config)?);
    Ok(Arc::new(GatewayState {
        processor: WebhookProcessor::new(responder, verifier),
        enable_test_endpoint: config.gateway.enable_test_endpoint,
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(&config)?;

    #[cfg(unix)]
    reload_on_hangup(state.processor.responder().knowledge().clone());

    let app = build_router(state);

    info!(
        addr = %addr,
        test_endpoint = config.gateway.enable_test_endpoint,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reload the knowledge directory whenever the process receives `SIGHUP`.
#[cfg(unix)]
fn reload_on_hangup(knowledge: Arc<KnowledgeBase>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGHUP, knowledge reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            let report = knowledge.reload().await;
            info!(
                files_skipped = report.files_skipped,
                records_skipped = report.records_skipped,
                "SIGHUP knowledge reload finished"
            );
        }
    });
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    knowledge_records: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        knowledge_records: state.processor.responder().knowledge().snapshot().len(),
    })
}

async fn callback_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.processor.process(&body, signature).await;
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::OK);
    let text = if status.is_success() { "OK" } else { "Bad Request" };
    (status, text)
}

#[derive(Deserialize)]
struct TestPressRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct TestPressResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
}

/// Runs one turn without delivery and echoes the start of the answer.
async fn test_press_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> (StatusCode, Json<TestPressResponse>) {
    let request: TestPressRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Invalid /test_press body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TestPressResponse {
                    status: "error",
                    reply: None,
                }),
            );
        }
    };

    let text = request.text.as_deref().unwrap_or(DEFAULT_PRESS_TEXT);
    let user_id = request
        .user_id
        .as_deref()
        .unwrap_or(ragline_channels::ANONYMOUS_USER);

    let reply = state.processor.responder().respond(user_id, text).await;
    let preview: String = reply.payload.text().chars().take(PRESS_PREVIEW_CHARS).collect();

    (
        StatusCode::OK,
        Json(TestPressResponse {
            status: "success",
            reply: Some(preview),
        }),
    )
}
