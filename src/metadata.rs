//! Metadata extraction from transcript bodies.
//!
//! Extraction is a total function: any malformed body yields the all-defaults
//! fallback rather than an error, so ingestion never fails solely because
//! metadata could not be derived.

use serde_json::Value;

use crate::models::ChatMetadata;

/// Derives summary fields from an untyped transcript body.
///
/// - `model_name` — the body's `model` string, or `"unknown"`.
/// - `message_count` — length of the `messages` array, or 0.
/// - `first_user_message` — content of the first message with role `user`.
/// - `last_assistant_message` — content of the last message with role
///   `assistant`, scanning from the end.
///
/// Non-string `role`/`content` fields and non-array `messages` are treated
/// as absent.
pub fn extract_chat_metadata(body: &Value) -> ChatMetadata {
    let model_name = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let messages = body.get("messages").and_then(Value::as_array);

    let message_count = messages.map(|m| m.len() as i64).unwrap_or(0);

    let first_user_message = messages
        .and_then(|msgs| msgs.iter().find(|m| role_of(m) == Some("user")))
        .and_then(content_of);

    let last_assistant_message = messages
        .and_then(|msgs| msgs.iter().rev().find(|m| role_of(m) == Some("assistant")))
        .and_then(content_of);

    ChatMetadata {
        model_name,
        message_count,
        first_user_message,
        last_assistant_message,
    }
}

fn role_of(message: &Value) -> Option<&str> {
    message.get("role").and_then(Value::as_str)
}

fn content_of(message: &Value) -> Option<String> {
    message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
}
