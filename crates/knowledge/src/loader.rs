//! Knowledge directory loader.
//!
//! Walks a directory tree, reads every `*.json` file in sorted path order and
//! merges their topics into one [`KnowledgeStore`]. Bad input is isolated at
//! the smallest unit possible: an unreadable directory gives an empty store,
//! a broken file is skipped, a broken record is skipped.

use crate::record::KnowledgeRecord;
use crate::store::KnowledgeStore;
use ragline_core::error::KnowledgeError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Counters from one load, for logging and the `kb` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub records_skipped: usize,
    /// Records in the resulting store, after duplicate topics collapsed.
    pub records: usize,
}

/// Load every knowledge file under `dir`. Never fails.
pub fn load_dir(dir: &Path) -> (KnowledgeStore, LoadReport) {
    let mut store = KnowledgeStore::new();
    let mut report = LoadReport::default();

    let files = match collect_json_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "Knowledge directory unavailable, starting with an empty store");
            return (store, report);
        }
    };

    for path in files {
        match read_file(&path) {
            Ok(fields) => {
                report.files_loaded += 1;
                for (topic, value) in fields {
                    match KnowledgeRecord::from_json(topic.clone(), value) {
                        Ok(record) => {
                            if store.insert(record) {
                                debug!(topic = %topic, path = %path.display(), "Duplicate topic replaced");
                            }
                        }
                        Err(reason) => {
                            report.records_skipped += 1;
                            let err = KnowledgeError::MalformedRecord {
                                path: path.clone(),
                                topic,
                                reason,
                            };
                            warn!(error = %err, "Skipping knowledge record");
                        }
                    }
                }
            }
            Err(e) => {
                report.files_skipped += 1;
                warn!(error = %e, "Skipping knowledge file");
            }
        }
    }

    report.records = store.len();
    (store, report)
}

fn read_file(path: &Path) -> Result<Map<String, Value>, KnowledgeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let value: Value = serde_json::from_str(&raw).map_err(|e| KnowledgeError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(KnowledgeError::Malformed {
            path: path.to_path_buf(),
            reason: format!("top level must be an object of topics, got {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Recursively collect `*.json` files, sorted by path.
///
/// Only the root directory being missing or unreadable is an error;
/// unreadable subdirectories are logged and skipped. Symlinked directories
/// are never descended, so link cycles cannot make the walk revisit a tree.
/// A symlink to a regular `*.json` file is still loaded.
fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>, KnowledgeError> {
    if !dir.is_dir() {
        return Err(KnowledgeError::DirectoryMissing(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    let mut is_root = true;

    while let Some(current) = pending.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                let err = KnowledgeError::Unreadable {
                    path: current.clone(),
                    reason: e.to_string(),
                };
                if is_root {
                    return Err(err);
                }
                warn!(error = %err, "Skipping knowledge subdirectory");
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if file_type.is_symlink() && !path.is_file() {
                debug!(path = %path.display(), "Not following symlinked directory");
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
