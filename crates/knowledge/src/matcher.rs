//! Query matching.
//!
//! A record is relevant when its topic, or any of its keywords, occurs as a
//! substring of the question after both sides are normalized (whitespace
//! removed, lower-cased). There is no tokenization or word-boundary check,
//! so short keywords can match inside longer words.

use crate::record::KnowledgeRecord;
use crate::store::KnowledgeStore;

/// Strip all whitespace and case-fold.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `record` is relevant to `query`.
pub fn matches(query: &str, record: &KnowledgeRecord) -> bool {
    matches_normalized(&normalize(query), record)
}

/// Same as [`matches`] for a query that is already normalized.
pub(crate) fn matches_normalized(normalized_query: &str, record: &KnowledgeRecord) -> bool {
    if normalized_query.is_empty() {
        return false;
    }

    let topic = record.normalized_topic();
    if !topic.is_empty() && normalized_query.contains(topic) {
        return true;
    }

    record
        .normalized_keywords()
        .iter()
        .any(|kw| normalized_query.contains(kw.as_str()))
}

/// All records relevant to `query`, in store order.
pub fn find_all<'a>(query: &str, store: &'a KnowledgeStore) -> Vec<&'a KnowledgeRecord> {
    let normalized = normalize(query);
    store
        .iter()
        .filter(|record| matches_normalized(&normalized, record))
        .collect()
}
