//! Error types for the RagLine domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider returned an empty completion")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Delivery timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Failures while loading knowledge files.
///
/// These never cross the knowledge crate boundary as `Err` values: the loader
/// logs them and carries on with whatever it could read.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge directory not found: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Malformed knowledge file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Malformed record '{topic}' in {path}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        topic: String,
        reason: String,
    },
}
