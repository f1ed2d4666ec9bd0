//! # RagLine Core
//!
//! Domain types, traits, and error definitions for the RagLine knowledge bot.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two remote capabilities the bot relies on (chat completion and
//! outbound messaging) are defined as traits here. Implementations live in
//! their respective crates, so the orchestration logic can be exercised with
//! scripted stand-ins and no network access.

pub mod channel;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{LinkAction, Messenger, OutboundMessage, OutboundPayload};
pub use error::{ChannelError, KnowledgeError, ProviderError};
pub use message::{ConversationTurn, Message, Role, TurnRole};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
