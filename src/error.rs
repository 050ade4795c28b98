//! Error taxonomy for the collection and query paths.
//!
//! The HTTP layer maps these to status codes: `InvalidPayload` and
//! `MissingIdentifier` are client errors (400), `NotFound` is 404, and
//! `Storage` is a server-side failure (500). Watcher-local indexing errors
//! never reach this taxonomy; they are contained and logged per file.

use thiserror::Error;

/// Errors surfaced by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The request body was not valid JSON or did not match the expected
    /// `{ data: [ { data: <document> } ] }` envelope.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The unwrapped document carried no usable `id`.
    #[error("document id is required")]
    MissingIdentifier,

    /// The canonical file write or the record upsert failed.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Errors surfaced by the read-only query paths.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No record exists for the requested id.
    #[error("chat not found: {0}")]
    NotFound(String),

    /// The database query failed or a stored row was unreadable.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}
