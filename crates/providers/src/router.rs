//! Provider construction from configuration.
//!
//! Resolves the configured provider to a base URL and builds the
//! OpenAI-compatible client. No API key means no provider: the bot then
//! answers every question with the configured offline reply.

use crate::openai_compat::OpenAiCompatProvider;
use ragline_config::ProviderConfig;
use ragline_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the completion provider described by `config`.
///
/// Returns `None` when no API key is set, the provider has no base URL, or
/// the HTTP client cannot be built.
pub fn build_from_config(config: &ProviderConfig) -> Option<Arc<dyn Provider>> {
    let api_key = match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            warn!(provider = %config.name, "No API key configured, completion disabled");
            return None;
        }
    };

    let Some(base_url) = config.base_url() else {
        warn!(provider = %config.name, "Unknown provider and no api_url, completion disabled");
        return None;
    };

    match OpenAiCompatProvider::new(
        &config.name,
        &base_url,
        api_key,
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(provider) => {
            info!(provider = %config.name, base_url = %base_url, model = %config.model, "Completion provider ready");
            Some(Arc::new(provider))
        }
        Err(e) => {
            warn!(provider = %config.name, error = %e, "Failed to build completion provider");
            None
        }
    }
}
