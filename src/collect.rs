//! Ingestion pipeline orchestration.
//!
//! Takes a raw HTTP payload through the full write path: envelope unwrap →
//! id extraction → canonical file write → metadata extraction → record
//! upsert. The file write and the upsert are sequential but not wrapped in a
//! cross-store transaction; a failure after the file write leaves an orphan
//! file that the watcher will still index (see DESIGN.md).

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::CollectError;
use crate::metadata::extract_chat_metadata;
use crate::models::{ChatMetadata, IngestReceipt};
use crate::store;

/// Ingests one raw payload. On success exactly one file has been written and
/// exactly one row upserted. The search index is never touched here; the
/// watcher picks the file up asynchronously.
pub async fn ingest(
    pool: &SqlitePool,
    config: &Config,
    raw: &[u8],
) -> Result<IngestReceipt, CollectError> {
    let payload: Value = serde_json::from_slice(raw)
        .map_err(|e| CollectError::InvalidPayload(format!("invalid JSON: {e}")))?;

    let document = unwrap_envelope(payload)?;

    let id = document
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(CollectError::MissingIdentifier)?
        .to_string();

    let collected_at = Utc::now().timestamp();

    // File first. If this fails there is no partial record to clean up.
    let json_path = store::write_document(&config.store.docs_dir, &id, &document)
        .map_err(CollectError::Storage)?;

    let meta = extract_chat_metadata(&document);

    upsert_chat(pool, &id, collected_at, &json_path.to_string_lossy(), &document, &meta)
        .await
        .map_err(|e| CollectError::Storage(e.into()))?;

    tracing::info!(id = %id, path = %json_path.display(), "collected chat");

    Ok(IngestReceipt { id, json_path })
}

/// Unwraps the producer envelope `{ data: [ { data: <document> }, ... ] }`,
/// returning the first entry's document. Exactly this shape is accepted;
/// anything else fails closed.
fn unwrap_envelope(payload: Value) -> Result<Value, CollectError> {
    let invalid = |what: &str| CollectError::InvalidPayload(what.to_string());

    let Value::Object(mut envelope) = payload else {
        return Err(invalid("expected a JSON object"));
    };

    let Some(Value::Array(entries)) = envelope.remove("data") else {
        return Err(invalid("expected a `data` array"));
    };

    let Some(first) = entries.into_iter().next() else {
        return Err(invalid("`data` array is empty"));
    };

    let Value::Object(mut entry) = first else {
        return Err(invalid("`data` entries must be objects"));
    };

    entry
        .remove("data")
        .ok_or_else(|| invalid("`data` entry has no inner `data` document"))
}

/// Primary-key conflict resolves to replace-in-place: re-ingestion under the
/// same id yields exactly one row.
async fn upsert_chat(
    pool: &SqlitePool,
    id: &str,
    collected_at: i64,
    json_path: &str,
    body: &Value,
    meta: &ChatMetadata,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chats (id, collected_at, json_path, body, model_name,
                           message_count, first_user_message, last_assistant_message)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            collected_at = excluded.collected_at,
            json_path = excluded.json_path,
            body = excluded.body,
            model_name = excluded.model_name,
            message_count = excluded.message_count,
            first_user_message = excluded.first_user_message,
            last_assistant_message = excluded.last_assistant_message
        "#,
    )
    .bind(id)
    .bind(collected_at)
    .bind(json_path)
    .bind(body.to_string())
    .bind(&meta.model_name)
    .bind(meta.message_count)
    .bind(&meta.first_user_message)
    .bind(&meta.last_assistant_message)
    .execute(pool)
    .await?;

    Ok(())
}
