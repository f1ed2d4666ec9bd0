//! Knowledge record model.
//!
//! A knowledge file is a JSON object of topic → record. A record is an open
//! set of fact fields plus three reserved keys:
//!
//! | Key | Meaning | Shape |
//! |-----|---------|-------|
//! | `關鍵字` | keywords | list of strings, or category → list of strings |
//! | `圖片` | images | list of URLs |
//! | `URL_LINKS` | link buttons | list of `{title, url}` (`label` accepted) |
//!
//! Reserved keys are never rendered as facts. A reserved key with an
//! unexpected shape is logged and ignored; the rest of the record still loads.
//! A single string is accepted where a list is expected, and a single link
//! object where a list of links is expected.

use crate::matcher::normalize;
use ragline_core::channel::LinkAction;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use tracing::warn;

pub const KEYWORDS_KEY: &str = "關鍵字";
pub const IMAGES_KEY: &str = "圖片";
pub const LINKS_KEY: &str = "URL_LINKS";

/// The two accepted shapes of the keyword field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    /// `["老師", "教授"]`
    List(Vec<String>),
    /// `{"師資": ["老師", "教授"], "課程": ["必修"]}`
    Categorized(serde_json::Map<String, Value>),
}

impl Keywords {
    /// Flatten to a single ordered list, dropping blanks.
    ///
    /// Category values may be a list or a single string.
    pub fn flatten(self) -> Result<Vec<String>, String> {
        let raw = match self {
            Keywords::List(list) => list,
            Keywords::Categorized(map) => {
                let mut out = Vec::new();
                for (category, value) in map {
                    match value {
                        Value::String(s) => out.push(s),
                        Value::Array(items) => {
                            for item in items {
                                match item {
                                    Value::String(s) => out.push(s),
                                    other => {
                                        return Err(format!(
                                            "keyword category '{category}' holds a non-string: {other}"
                                        ));
                                    }
                                }
                            }
                        }
                        other => {
                            return Err(format!(
                                "keyword category '{category}' must be a list, got {other}"
                            ));
                        }
                    }
                }
                out
            }
        };
        Ok(raw.into_iter().filter(|k| !k.trim().is_empty()).collect())
    }
}

/// The value of a fact field.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Text(String),
    List(Vec<String>),
    /// Numbers, booleans, nested objects. Rendered in JSON form.
    Other(Value),
}

impl FactValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => FactValue::Text(s),
            Value::Null => FactValue::Text(String::new()),
            Value::Array(items) => FactValue::List(items.into_iter().map(scalar_text).collect()),
            other => FactValue::Other(other),
        }
    }

    /// Text form used in the reference block; lists are newline-joined.
    pub fn render(&self) -> String {
        match self {
            FactValue::Text(s) => s.clone(),
            FactValue::List(items) => items.join("\n"),
            FactValue::Other(v) => v.to_string(),
        }
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// One topic of the knowledge base. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRecord {
    topic: String,
    normalized_topic: String,
    facts: Vec<(String, FactValue)>,
    keywords: Vec<String>,
    normalized_keywords: Vec<String>,
    images: Vec<String>,
    links: Vec<LinkAction>,
}

impl KnowledgeRecord {
    /// Build a record from its JSON object, keeping the object's field order.
    ///
    /// Fails with a human-readable reason only when the value is not an
    /// object.
    pub fn from_json(topic: impl Into<String>, value: Value) -> Result<Self, String> {
        let topic = topic.into();
        let Value::Object(fields) = value else {
            return Err("record must be a JSON object".into());
        };

        let mut facts = Vec::new();
        let mut keywords = Vec::new();
        let mut images = Vec::new();
        let mut links = Vec::new();

        for (key, value) in fields {
            match key.as_str() {
                KEYWORDS_KEY => keywords = parse_keywords(&topic, value),
                IMAGES_KEY => images = parse_images(&topic, value),
                LINKS_KEY => links = parse_links(&topic, value),
                _ => facts.push((key, FactValue::from_json(value))),
            }
        }

        let normalized_keywords = keywords
            .iter()
            .map(|k| normalize(k))
            .filter(|k| !k.is_empty())
            .collect();

        Ok(Self {
            normalized_topic: normalize(&topic),
            topic,
            facts,
            keywords,
            normalized_keywords,
            images,
            links,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn normalized_topic(&self) -> &str {
        &self.normalized_topic
    }

    /// Fact fields in file order. Reserved fields never appear here.
    pub fn facts(&self) -> &[(String, FactValue)] {
        &self.facts
    }

    /// Flattened keywords, as written.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub(crate) fn normalized_keywords(&self) -> &[String] {
        &self.normalized_keywords
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn links(&self) -> &[LinkAction] {
        &self.links
    }
}

fn ignore_field(topic: &str, field: &str, reason: impl Display) {
    warn!(topic, field, reason = %reason, "Ignoring malformed reserved field");
}

fn parse_keywords(topic: &str, value: Value) -> Vec<String> {
    let parsed = match value {
        Value::String(keyword) => Keywords::List(vec![keyword]),
        other => match serde_json::from_value::<Keywords>(other) {
            Ok(parsed) => parsed,
            Err(e) => {
                ignore_field(topic, KEYWORDS_KEY, e);
                return Vec::new();
            }
        },
    };
    parsed.flatten().unwrap_or_else(|reason| {
        ignore_field(topic, KEYWORDS_KEY, reason);
        Vec::new()
    })
}

fn parse_images(topic: &str, value: Value) -> Vec<String> {
    let items = match value {
        Value::String(url) => vec![url],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url),
                other => {
                    ignore_field(topic, IMAGES_KEY, format!("non-string entry {other}"));
                    None
                }
            })
            .collect(),
        other => {
            ignore_field(topic, IMAGES_KEY, format!("expected a list of URLs, got {other}"));
            Vec::new()
        }
    };
    items.into_iter().filter(|u| !u.trim().is_empty()).collect()
}

fn parse_links(topic: &str, value: Value) -> Vec<LinkAction> {
    let items = match value {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        other => {
            ignore_field(topic, LINKS_KEY, format!("expected a list of links, got {other}"));
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<LinkAction>(item) {
            Ok(link) if !link.url.trim().is_empty() => Some(link),
            Ok(_) => None,
            Err(e) => {
                ignore_field(topic, LINKS_KEY, e);
                None
            }
        })
        .collect()
}
