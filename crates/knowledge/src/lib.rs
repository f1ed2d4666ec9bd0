//! Knowledge base for RagLine.
//!
//! A small, keyword-indexed set of topic records loaded from JSON files:
//!
//! - [`loader`]: recursive directory scan, per-file and per-record error isolation
//! - [`store`]: immutable snapshots and the [`KnowledgeBase`] service that swaps them
//! - [`matcher`]: whitespace/case normalization and substring relevance
//! - [`assembler`]: turns matched records into a reference block plus media
//!
//! Records are grounding for a completion call, not search results: every
//! record whose topic or keyword occurs in the question contributes all of
//! its facts.

pub mod assembler;
pub mod loader;
pub mod matcher;
pub mod record;
pub mod store;

pub use assembler::{ContextAssembler, RetrievalResult, assemble};
pub use loader::{LoadReport, load_dir};
pub use matcher::{find_all, matches, normalize};
pub use record::{FactValue, KnowledgeRecord, Keywords, IMAGES_KEY, KEYWORDS_KEY, LINKS_KEY};
pub use store::{KnowledgeBase, KnowledgeStore};
