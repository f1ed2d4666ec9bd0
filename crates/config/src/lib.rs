//! Configuration loading, validation, and management for RagLine.
//!
//! Loads configuration from a TOML file (default `ragline.toml`) with
//! environment variable overrides. Validates all settings at startup.
//! Secrets (channel tokens, API keys) are expected to come from the
//! environment and are redacted from `Debug` output.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ragline.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// LINE Messaging API settings
    #[serde(default)]
    pub line: LineConfig,

    /// Knowledge base settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Per-user conversation history settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Reply wording and payload limits
    #[serde(default)]
    pub reply: ReplyConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

// ── Provider ──────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; well-known names resolve to a default base URL.
    #[serde(default = "default_provider")]
    pub name: String,

    /// Override the provider base URL (OpenAI-compatible).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key. Normally supplied through `GROQ_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on one completion call, in seconds.
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    800
}
fn default_completion_timeout() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

/// Completion temperatures accepted by `validate`.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.2..=0.4;

impl ProviderConfig {
    /// Default base URL for the providers known by name.
    pub fn known_base_url(name: &str) -> Option<&'static str> {
        match name {
            "groq" => Some("https://api.groq.com/openai/v1"),
            "openai" => Some("https://api.openai.com/v1"),
            _ => None,
        }
    }

    /// `api_url` if set, else the known default for `name`.
    pub fn base_url(&self) -> Option<String> {
        match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(url.to_string()),
            _ => Self::known_base_url(&self.name).map(str::to_string),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── LINE ──────────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Bearer token for the Messaging API. Normally `CHANNEL_ACCESS_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_access_token: Option<String>,

    /// Webhook signing secret. Normally `CHANNEL_SECRET`.
    /// Unset or empty rejects every webhook unless
    /// `skip_signature_verification` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_secret: Option<String>,

    /// Accept unsigned webhooks when no secret is configured. Local use only.
    #[serde(default)]
    pub skip_signature_verification: bool,

    #[serde(default = "default_line_api_url")]
    pub api_url: String,

    /// Upper bound on one reply call, in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_line_api_url() -> String {
    "https://api.line.me".into()
}
fn default_send_timeout() -> u64 {
    10
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            channel_secret: None,
            skip_signature_verification: false,
            api_url: default_line_api_url(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_access_token", &redact(&self.channel_access_token))
            .field("channel_secret", &redact(&self.channel_secret))
            .field("skip_signature_verification", &self.skip_signature_verification)
            .field("api_url", &self.api_url)
            .field("send_timeout_secs", &self.send_timeout_secs)
            .finish()
    }
}

// ── Knowledge ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory scanned recursively for `*.json` knowledge files.
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,

    /// Ceiling on the reference block injected into the system prompt.
    #[serde(default = "default_max_reference_chars")]
    pub max_reference_chars: usize,
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_max_reference_chars() -> usize {
    6000
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            max_reference_chars: default_max_reference_chars(),
        }
    }
}

// ── Conversation ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Character ceiling on one user's retained history.
    #[serde(default = "default_history_char_budget")]
    pub history_char_budget: usize,

    /// Number of most recent turns replayed into each prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_history_char_budget() -> usize {
    2000
}
fn default_history_window() -> usize {
    8
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_char_budget: default_history_char_budget(),
            history_window: default_history_window(),
        }
    }
}

// ── Reply ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Persona and answering rules placed at the top of the system prompt.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Sent when the completion call fails or times out.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Sent when no completion provider is configured.
    #[serde(default = "default_offline_reply")]
    pub offline_reply: String,

    /// Prefixed to the text-only retry after a failed multi-message reply.
    #[serde(default = "default_partial_delivery_notice")]
    pub partial_delivery_notice: String,

    #[serde(default = "default_max_images")]
    pub max_images: usize,

    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// LINE rejects button labels longer than 20 characters.
    #[serde(default = "default_max_label_chars")]
    pub max_label_chars: usize,

    #[serde(default = "default_links_title")]
    pub links_title: String,

    #[serde(default = "default_links_text")]
    pub links_text: String,

    /// Attach images and link buttons from matched records.
    #[serde(default = "default_true")]
    pub attach_media: bool,
}

fn default_persona() -> String {
    "你是一位專業助理，負責回答使用者關於系所的問題。請使用繁體中文，回答簡潔、準確。".into()
}
fn default_fallback_reply() -> String {
    "AI 暫時無法回應，請稍後再試。".into()
}
fn default_offline_reply() -> String {
    "AI 離線中".into()
}
fn default_partial_delivery_notice() -> String {
    "（部分內容無法顯示）".into()
}
fn default_max_images() -> usize {
    2
}
fn default_max_links() -> usize {
    4
}
fn default_max_label_chars() -> usize {
    20
}
fn default_links_title() -> String {
    "相關連結".into()
}
fn default_links_text() -> String {
    "請點選以下連結查看更多資訊".into()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            fallback_reply: default_fallback_reply(),
            offline_reply: default_offline_reply(),
            partial_delivery_notice: default_partial_delivery_notice(),
            max_images: default_max_images(),
            max_links: default_max_links(),
            max_label_chars: default_max_label_chars(),
            links_title: default_links_title(),
            links_text: default_links_text(),
            attach_media: true,
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Mount `POST /test_press` for load-testing harnesses. Never in production.
    #[serde(default)]
    pub enable_test_endpoint: bool,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            enable_test_endpoint: false,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from `path`, then apply environment overrides:
    ///
    /// - `CHANNEL_ACCESS_TOKEN`, `CHANNEL_SECRET`, `RAGLINE_SKIP_SIGNATURE_VERIFICATION`
    /// - `RAGLINE_API_KEY` (highest priority), `GROQ_API_KEY`
    /// - `RAGLINE_PROVIDER`, `RAGLINE_MODEL`, `RAGLINE_KNOWLEDGE_DIR`
    /// - `RAGLINE_HISTORY_CHAR_BUDGET`, `RAGLINE_HISTORY_WINDOW`, `PORT`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = Some(token);
        }
        if let Some(secret) = non_empty("CHANNEL_SECRET") {
            self.line.channel_secret = Some(secret);
        }
        if let Some(skip) = non_empty("RAGLINE_SKIP_SIGNATURE_VERIFICATION") {
            self.line.skip_signature_verification =
                parse_env("RAGLINE_SKIP_SIGNATURE_VERIFICATION", &skip)?;
        }
        if let Some(key) = non_empty("RAGLINE_API_KEY").or_else(|| non_empty("GROQ_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(provider) = non_empty("RAGLINE_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = non_empty("RAGLINE_MODEL") {
            self.provider.model = model;
        }
        if let Some(dir) = non_empty("RAGLINE_KNOWLEDGE_DIR") {
            self.knowledge.dir = PathBuf::from(dir);
        }
        if let Some(budget) = non_empty("RAGLINE_HISTORY_CHAR_BUDGET") {
            self.conversation.history_char_budget = parse_env("RAGLINE_HISTORY_CHAR_BUDGET", &budget)?;
        }
        if let Some(window) = non_empty("RAGLINE_HISTORY_WINDOW") {
            self.conversation.history_window = parse_env("RAGLINE_HISTORY_WINDOW", &window)?;
        }
        if let Some(port) = non_empty("PORT") {
            self.gateway.port = parse_env("PORT", &port)?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !TEMPERATURE_RANGE.contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "provider.temperature must be between {} and {}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        if self.provider.base_url().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider '{}': set provider.api_url",
                self.provider.name
            )));
        }
        if self.knowledge.max_reference_chars == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_reference_chars must be at least 1".into(),
            ));
        }
        if self.provider.timeout_secs == 0 || self.line.send_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least one second".into(),
            ));
        }
        if self.conversation.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.history_window must be at least 1".into(),
            ));
        }
        if self.reply.max_links > 4 {
            return Err(ConfigError::ValidationError(
                "reply.max_links cannot exceed 4 (button template limit)".into(),
            ));
        }
        if self.reply.max_label_chars == 0 {
            return Err(ConfigError::ValidationError(
                "reply.max_label_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether a completion API key is available.
    pub fn has_api_key(&self) -> bool {
        self.provider
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has an invalid value: {value}")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
