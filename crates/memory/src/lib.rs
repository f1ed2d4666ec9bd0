//! Conversation memory for RagLine.
//!
//! Process-lifetime, per-user history of completed exchanges. Nothing is
//! persisted; a restart forgets every conversation.

pub mod conversation;

pub use conversation::{ConversationMemory, DEFAULT_HISTORY_CHAR_BUDGET, MIN_RETAINED_TURNS};
