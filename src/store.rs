//! Canonical JSON file store.
//!
//! A flat directory holding one pretty-printed `<id>.json` file per collected
//! transcript. Files are append-only from the system's point of view:
//! re-ingestion under the same id overwrites, nothing here deletes.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Writes the canonical file for a document, overwriting any existing copy.
/// Returns the path written.
pub fn write_document(docs_dir: &Path, id: &str, body: &Value) -> Result<PathBuf> {
    std::fs::create_dir_all(docs_dir)
        .with_context(|| format!("Failed to create document store: {}", docs_dir.display()))?;

    let path = docs_dir.join(format!("{id}.json"));
    let pretty = serde_json::to_string_pretty(body)?;
    std::fs::write(&path, pretty)
        .with_context(|| format!("Failed to write document: {}", path.display()))?;

    Ok(path)
}

/// Enumerates the `*.json` files at the top level of the document store.
/// Subdirectories are not descended into, matching the watcher's
/// non-recursive subscription.
pub fn list_documents(docs_dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(docs_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();

    // Sort for deterministic ordering
    paths.sort();
    paths
}
