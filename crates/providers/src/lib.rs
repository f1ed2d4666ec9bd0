//! Chat-completion provider implementations for RagLine.
//!
//! All providers implement the `ragline_core::Provider` trait.
//! [`build_from_config`] picks the backend described by configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
