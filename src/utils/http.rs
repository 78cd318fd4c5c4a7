use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

pub fn build_http_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!(
            "booth-exposure-assistant/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls a human-readable message out of an upstream error body.
///
/// Returns the `error.message` / `message` field when the body is JSON, plus a
/// truncated copy of the whole body for logging.
pub fn summarize_error_body(body: &str, limit: usize) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/errors/0/title").and_then(|v| v.as_str()))
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
            .map(|v| v.to_string());
        return (message, truncate_for_log(&value.to_string(), limit));
    }

    (None, truncate_for_log(trimmed, limit))
}
