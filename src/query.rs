//! Read-only search and fetch against the structured index.
//!
//! Both operations touch only SQLite; the search index is a separate
//! consumer reconciled by the watcher and never queried here.

use anyhow::Result;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::QueryError;
use crate::models::ChatSummary;

pub const DEFAULT_SEARCH_LIMIT: i64 = 10;

/// Filters for [`search_chats`]. Absent filters impose no constraint;
/// supplied filters are combined with AND semantics.
#[derive(Debug, Clone)]
pub struct SearchFilters {
    /// Case-insensitive substring match against the first user message, the
    /// last assistant message, or any message content in the body.
    pub query: Option<String>,
    /// Exact model name match.
    pub model: Option<String>,
    /// Minimum message count (inclusive).
    pub min_length: Option<i64>,
    pub limit: i64,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: None,
            model: None,
            min_length: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Returns summaries matching all supplied filters, newest first.
pub async fn search_chats(
    pool: &SqlitePool,
    filters: &SearchFilters,
) -> Result<Vec<ChatSummary>, QueryError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, collected_at, model_name, message_count, \
         first_user_message, last_assistant_message FROM chats WHERE 1=1",
    );

    if let Some(ref query) = filters.query {
        let needle = format!("%{}%", query.to_lowercase());
        builder.push(" AND (lower(coalesce(first_user_message, '')) LIKE ");
        builder.push_bind(needle.clone());
        builder.push(" OR lower(coalesce(last_assistant_message, '')) LIKE ");
        builder.push_bind(needle.clone());
        builder.push(
            " OR EXISTS (SELECT 1 FROM json_each(chats.body, '$.messages') AS m \
             WHERE lower(coalesce(json_extract(m.value, '$.content'), '')) LIKE ",
        );
        builder.push_bind(needle);
        builder.push("))");
    }

    if let Some(ref model) = filters.model {
        builder.push(" AND model_name = ");
        builder.push_bind(model.clone());
    }

    if let Some(min_length) = filters.min_length {
        builder.push(" AND message_count >= ");
        builder.push_bind(min_length);
    }

    // Tie-break on id so equal timestamps order deterministically.
    builder.push(" ORDER BY collected_at DESC, id ASC LIMIT ");
    builder.push_bind(filters.limit);

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::Storage(e.into()))?;

    let summaries = rows
        .iter()
        .map(|row| ChatSummary {
            id: row.get("id"),
            collected_at: format_ts_iso(row.get("collected_at")),
            model_name: row.get("model_name"),
            message_count: row.get("message_count"),
            first_user_message: row.get("first_user_message"),
            last_assistant_message: row.get("last_assistant_message"),
        })
        .collect();

    Ok(summaries)
}

/// Fetches the stored document body for `id`.
pub async fn get_chat(pool: &SqlitePool, id: &str) -> Result<Value, QueryError> {
    let body: Option<String> = sqlx::query_scalar("SELECT body FROM chats WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::Storage(e.into()))?;

    let body = body.ok_or_else(|| QueryError::NotFound(id.to_string()))?;

    serde_json::from_str(&body).map_err(|e| QueryError::Storage(e.into()))
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ============ CLI entry points ============

/// CLI search — runs [`search_chats`] and prints a numbered summary list.
pub async fn run_search(config: &Config, filters: &SearchFilters) -> Result<()> {
    let pool = db::connect(config).await?;
    let results = search_chats(&pool, filters).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, chat) in results.iter().enumerate() {
        println!(
            "{}. {} / {} ({} messages)",
            i + 1,
            chat.model_name,
            chat.collected_at,
            chat.message_count
        );
        if let Some(ref first) = chat.first_user_message {
            println!("    first user: \"{}\"", excerpt(first));
        }
        if let Some(ref last) = chat.last_assistant_message {
            println!("    last assistant: \"{}\"", excerpt(last));
        }
        println!("    id: {}", chat.id);
        println!();
    }

    pool.close().await;
    Ok(())
}

/// CLI get — prints the stored body, or exits nonzero when missing.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = get_chat(&pool, id).await;
    pool.close().await;

    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(QueryError::NotFound(_)) => {
            eprintln!("Error: chat not found: {id}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() > 80 {
        let cut: String = trimmed.chars().take(80).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
