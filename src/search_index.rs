//! Search-index HTTP client.
//!
//! The search engine is an external Meilisearch-compatible service. It is
//! treated as a capability that exposes create-index, add-documents,
//! delete-documents, and health — nothing else. The watcher reconciles
//! through the [`DocumentIndex`] trait so its logic is testable without a
//! live service.
//!
//! All calls are synchronous (blocking `reqwest`); the watcher processes one
//! file at a time and has nothing useful to do while an index call is in
//! flight.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchIndexConfig;

/// Delay between health-check attempts while waiting for the service.
const RETRY_DELAY: Duration = Duration::from_secs(5);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The index operations the watcher needs. Deliberately narrow: there is no
/// upsert, so callers replace documents by deleting ids first and re-adding.
pub trait DocumentIndex {
    fn delete_documents(&self, ids: &[String]) -> Result<()>;
    fn add_documents(&self, docs: &[Value]) -> Result<()>;
}

/// Blocking HTTP client for a Meilisearch-compatible index.
pub struct SearchIndexClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    index: String,
}

impl SearchIndexClient {
    pub fn new(config: &SearchIndexConfig) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
            index: config.index.clone(),
        })
    }

    /// Connects and waits for the service to become healthy, retrying up to
    /// `health_retries` times. Tolerates the index service starting after
    /// the watcher.
    pub fn connect_with_retry(config: &SearchIndexConfig) -> Result<Self> {
        let client = Self::new(config)?;

        let mut last_err = None;
        for attempt in 1..=config.health_retries {
            match client.health() {
                Ok(()) => {
                    tracing::info!(url = %client.base_url, "connected to search index");
                    return Ok(client);
                }
                Err(e) => {
                    tracing::info!(
                        "waiting for search index ({attempt}/{})",
                        config.health_retries
                    );
                    last_err = Some(e);
                }
            }
            if attempt < config.health_retries {
                std::thread::sleep(RETRY_DELAY);
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no health attempts made")))
            .with_context(|| format!("search index unreachable at {}", config.url))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub fn health(&self) -> Result<()> {
        self.authorize(self.http.get(format!("{}/health", self.base_url)))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// Creates the index with `id` as its primary key. An already-existing
    /// index is not an error.
    pub fn ensure_index(&self) -> Result<()> {
        let response = self
            .post("/indexes")
            .json(&serde_json::json!({ "uid": self.index, "primaryKey": "id" }))
            .send()?;

        let status = response.status();
        if status.is_client_error() {
            // index_already_exists, most likely
            tracing::debug!(index = %self.index, %status, "index create declined");
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }
}

impl DocumentIndex for SearchIndexClient {
    fn delete_documents(&self, ids: &[String]) -> Result<()> {
        self.post(&format!("/indexes/{}/documents/delete-batch", self.index))
            .json(ids)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn add_documents(&self, docs: &[Value]) -> Result<()> {
        self.post(&format!("/indexes/{}/documents", self.index))
            .json(docs)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
