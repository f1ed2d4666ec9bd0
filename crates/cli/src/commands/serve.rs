//! `ragline serve`: Start the LINE webhook server.

use super::load_config;
use std::path::Path;

pub async fn run(config_path: &Path, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("RagLine Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Knowledge:  {}", config.knowledge.dir.display());
    println!("   Provider:   {} ({})", config.provider.name, config.provider.model);
    println!(
        "   Completion: {}",
        if config.has_api_key() { "enabled" } else { "offline (no API key)" }
    );
    println!(
        "   Signatures: {}",
        if config.line.channel_secret.as_deref().is_some_and(|s| !s.is_empty()) {
            "verified"
        } else if config.line.skip_signature_verification {
            "NOT verified (skip_signature_verification)"
        } else {
            "missing CHANNEL_SECRET"
        }
    );
    if config.gateway.enable_test_endpoint {
        println!("   /test_press enabled");
    }

    ragline_gateway::start(config).await?;

    Ok(())
}
