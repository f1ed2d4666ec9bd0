//! `ragline ask`: Run one turn locally and print the reply payload.
//!
//! Nothing is sent to LINE. Useful to check grounding and provider setup.

use super::load_config;
use ragline_agent::TurnOutcome;
use ragline_core::channel::OutboundMessage;
use std::path::Path;

pub async fn run(config_path: &Path, user: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let responder = ragline_gateway::build_responder(&config)?;
    if !responder.has_provider() {
        eprintln!("  No API key configured (GROQ_API_KEY / RAGLINE_API_KEY): answering offline.");
    }

    let reply = responder.respond(user, text).await;

    match &reply.outcome {
        TurnOutcome::Answered => {}
        TurnOutcome::Offline => eprintln!("  [offline]"),
        TurnOutcome::Fallback { reason } => eprintln!("  [fallback] {reason}"),
    }
    if reply.retrieval.matched_topics.is_empty() {
        eprintln!("  Matched: (none)");
    } else {
        eprintln!("  Matched: {}", reply.retrieval.matched_topics.join(", "));
    }

    for message in reply.payload.messages() {
        match message {
            OutboundMessage::Text { text } => println!("{text}"),
            OutboundMessage::Image { original_url, .. } => println!("[image] {original_url}"),
            OutboundMessage::Buttons { title, actions, .. } => {
                println!("[{title}]");
                for action in actions {
                    println!("  - {}: {}", action.title, action.url);
                }
            }
        }
    }

    Ok(())
}
