//! LINE channel for RagLine.
//!
//! - **signature**: `X-Line-Signature` verification over the raw body
//! - **events**: webhook envelope parsing
//! - **line**: reply-API [`Messenger`](ragline_core::Messenger) implementation

pub mod events;
pub mod line;
pub mod signature;

pub use events::{ANONYMOUS_USER, EventSource, InboundText, WebhookEnvelope, WebhookEvent};
pub use line::{LineMessenger, to_line_json};
pub use signature::SignatureVerifier;
