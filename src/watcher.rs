//! Search-index sync watcher.
//!
//! A standalone long-running process that observes the document store
//! directory and reconciles the search index against it. Change detection is
//! content-addressed: each file's SHA-256 is compared against the last hash
//! seen for that path, so duplicate filesystem notifications and
//! touch-without-change are no-ops. The hash map lives in memory only; a
//! restart re-hashes (and re-adds) every file once, after which unchanged
//! hashes short-circuit again.
//!
//! Every per-file failure — unreadable file, malformed JSON, index error —
//! is logged and contained; the loop never stops for one bad file.

use anyhow::{bail, Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::search_index::{DocumentIndex, SearchIndexClient};
use crate::store;

/// Keys stripped from a document before it is handed to the search index.
const STRIP_KEYS: [&str; 3] = ["settings", "current_leaf_message_uuid", "is_starred"];

/// What [`Reconciler::handle_file`] did with a file.
#[derive(Debug, PartialEq)]
pub enum FileOutcome {
    /// Content hash matched the last seen hash; no index operations ran.
    Unchanged,
    /// Documents were re-indexed (delete-by-id, then add).
    Indexed(usize),
}

/// Per-process reconciliation state: the index handle and the
/// last-seen-hash map keyed by file path.
pub struct Reconciler<I: DocumentIndex> {
    index: I,
    last_hash: HashMap<PathBuf, String>,
}

impl<I: DocumentIndex> Reconciler<I> {
    pub fn new(index: I) -> Self {
        Self {
            index,
            last_hash: HashMap::new(),
        }
    }

    /// Processes one path notification. Non-`.json` paths are ignored;
    /// failures are logged and swallowed so the caller's loop continues.
    pub fn process_path(&mut self, path: &Path) {
        if path.extension().map_or(true, |ext| ext != "json") {
            return;
        }

        match self.handle_file(path) {
            Ok(FileOutcome::Unchanged) => {}
            Ok(FileOutcome::Indexed(count)) => {
                tracing::info!(path = %path.display(), documents = count, "indexed");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to index file: {e:#}");
            }
        }
    }

    /// The reconciliation pipeline for one file: hash, compare, parse,
    /// normalize, clean, delete-then-add, record hash.
    fn handle_file(&mut self, path: &Path) -> Result<FileOutcome> {
        let bytes = std::fs::read(path).context("failed to read file")?;
        let hash = content_hash(&bytes);

        if self.last_hash.get(path) == Some(&hash) {
            return Ok(FileOutcome::Unchanged);
        }

        let content: Value = serde_json::from_slice(&bytes).context("malformed JSON")?;
        let documents: Vec<Value> = normalize_documents(content)?
            .iter()
            .map(clean_document)
            .collect();

        let ids: Vec<String> = documents
            .iter()
            .filter_map(|doc| doc.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        // Delete-then-add: the index only exposes delete-by-key and add, so
        // a same-id replacement is expressed as both operations.
        if !ids.is_empty() {
            self.index
                .delete_documents(&ids)
                .context("delete from search index failed")?;
        }
        self.index
            .add_documents(&documents)
            .context("add to search index failed")?;

        // Only a fully indexed file completes the idempotence check; a
        // failure above leaves the old hash so the next event retries.
        self.last_hash.insert(path.to_path_buf(), hash);

        Ok(FileOutcome::Indexed(documents.len()))
    }
}

/// SHA-256 of the file bytes, hex-encoded.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A stored file holds either a single document or an array of documents.
fn normalize_documents(content: Value) -> Result<Vec<Value>> {
    match content {
        Value::Object(_) => Ok(vec![content]),
        Value::Array(docs) => Ok(docs),
        other => bail!("expected an object or array, got {other}"),
    }
}

/// Projects a document for the search index: `settings`,
/// `current_leaf_message_uuid`, and `is_starred` are dropped.
fn clean_document(doc: &Value) -> Value {
    match doc {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !STRIP_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Runs the watcher until `shutdown` is set. Connects to the search index,
/// performs an initial pass over every existing file (convergence after
/// downtime), then drains filesystem events one at a time in delivery order.
pub fn run(config: &Config, shutdown: Arc<AtomicBool>) -> Result<()> {
    let client = SearchIndexClient::connect_with_retry(&config.search_index)?;
    client.ensure_index()?;

    let docs_dir = &config.store.docs_dir;
    std::fs::create_dir_all(docs_dir)
        .with_context(|| format!("failed to create watch directory: {}", docs_dir.display()))?;

    let mut reconciler = Reconciler::new(client);

    // Initial pass: index whatever accumulated while the watcher was down.
    let existing = store::list_documents(docs_dir);
    tracing::info!(
        dir = %docs_dir.display(),
        files = existing.len(),
        "initial reconciliation pass"
    );
    for path in existing {
        reconciler.process_path(&path);
    }

    let (tx, rx) = mpsc::channel::<Vec<PathBuf>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                let _ = tx.send(event.paths);
            }
        }
    })?;
    watcher.watch(docs_dir, RecursiveMode::NonRecursive)?;
    tracing::info!("watching {}", docs_dir.display());

    // One event at a time, in delivery order. The timeout only exists so
    // the shutdown flag is observed between events.
    while !shutdown.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(paths) => {
                for path in paths {
                    if path.is_file() {
                        reconciler.process_path(&path);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::info!("watcher stopping");
    drop(watcher);
    Ok(())
}
