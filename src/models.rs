//! Core data models used throughout Chat Collector.
//!
//! These types represent the derived metadata, search summaries, and
//! ingestion receipts that flow through the collection pipeline.

use serde::Serialize;
use std::path::PathBuf;

/// Summary fields derived from a transcript body by the metadata extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMetadata {
    pub model_name: String,
    pub message_count: i64,
    pub first_user_message: Option<String>,
    pub last_assistant_message: Option<String>,
}

impl Default for ChatMetadata {
    fn default() -> Self {
        Self {
            model_name: "unknown".to_string(),
            message_count: 0,
            first_user_message: None,
            last_assistant_message: None,
        }
    }
}

/// One search result row. The full body is deliberately excluded to keep
/// response payloads small; fetch it via `/chat/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub id: String,
    /// ISO8601 UTC timestamp of ingestion.
    pub collected_at: String,
    pub model_name: String,
    pub message_count: i64,
    pub first_user_message: Option<String>,
    pub last_assistant_message: Option<String>,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub id: String,
    /// Where the canonical JSON file was written.
    pub json_path: PathBuf,
}
