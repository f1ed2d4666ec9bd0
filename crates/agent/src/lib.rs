//! Response orchestration: the heart of RagLine.
//!
//! Every inbound text runs the same turn:
//!
//! 1. **Match** the question against the knowledge snapshot
//! 2. **Ground**: assemble the reference block, images and links
//! 3. **Complete**: system prompt + recent history + question → provider
//! 4. **Remember** the exchange, only when the completion succeeded
//! 5. **Reply**: text first, then images, then one link-button message,
//!    with a single text-only retry when the full reply is rejected
//!
//! Failures never escape a turn. Users see a fixed fallback sentence and the
//! operator sees a log line.

pub mod payload;
pub mod prompt;
pub mod responder;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use payload::{MAX_TEXT_CHARS, PayloadFormatter};
pub use prompt::{build_messages, build_system_prompt};
pub use responder::{Responder, ResponderSettings, TurnOutcome, TurnReply, TurnState};
pub use webhook::{WebhookOutcome, WebhookProcessor};
