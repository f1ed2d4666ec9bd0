//! Turns the records matched by a question into grounding for the prompt.

use crate::matcher::find_all;
use crate::store::KnowledgeStore;
use ragline_core::channel::LinkAction;
use serde::Serialize;

/// Grounding derived from one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// `[field]: value` entries of every matched record, newline-joined.
    pub reference_text: String,
    /// Images of the first matched record that has any.
    pub images: Option<Vec<String>>,
    /// Links of the first matched record that has any.
    pub links: Option<Vec<LinkAction>>,
    pub matched_topics: Vec<String>,
}

impl RetrievalResult {
    /// Whether any knowledge was found for the question.
    pub fn is_grounded(&self) -> bool {
        !self.reference_text.is_empty()
    }
}

/// Builds [`RetrievalResult`]s with a ceiling on the reference block size.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_reference_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(6000)
    }
}

impl ContextAssembler {
    pub fn new(max_reference_chars: usize) -> Self {
        Self { max_reference_chars }
    }

    pub fn max_reference_chars(&self) -> usize {
        self.max_reference_chars
    }

    pub fn assemble(&self, query: &str, store: &KnowledgeStore) -> RetrievalResult {
        let matched = find_all(query, store);

        let mut result = RetrievalResult::default();
        let mut block = ReferenceBlock::new(self.max_reference_chars);

        for record in matched {
            result.matched_topics.push(record.topic().to_string());

            for (key, value) in record.facts() {
                block.push(format!("[{key}]: {}", value.render()));
            }

            if result.images.is_none() && !record.images().is_empty() {
                result.images = Some(record.images().to_vec());
            }
            if result.links.is_none() && !record.links().is_empty() {
                result.links = Some(record.links().to_vec());
            }
        }

        result.reference_text = block.finish();
        result
    }
}

/// Assemble without a size ceiling.
pub fn assemble(query: &str, store: &KnowledgeStore) -> RetrievalResult {
    ContextAssembler::new(usize::MAX).assemble(query, store)
}

/// Accumulates entries until the next one would overflow the ceiling.
///
/// Entries are never split, except that a first entry larger than the whole
/// ceiling is cut to fit so the block is never empty when something matched.
struct ReferenceBlock {
    text: String,
    chars: usize,
    limit: usize,
    full: bool,
}

impl ReferenceBlock {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
            full: false,
        }
    }

    fn push(&mut self, entry: String) {
        if self.full {
            return;
        }
        let entry_chars = entry.chars().count();

        if self.text.is_empty() {
            if entry_chars <= self.limit {
                self.chars = entry_chars;
                self.text = entry;
            } else {
                self.text = entry.chars().take(self.limit).collect();
                self.chars = self.limit;
                self.full = true;
            }
            return;
        }

        let needed = entry_chars.saturating_add(1);
        if self.chars.saturating_add(needed) > self.limit {
            self.full = true;
            return;
        }
        self.text.push('\n');
        self.text.push_str(&entry);
        self.chars += needed;
    }

    fn finish(self) -> String {
        self.text
    }
}
