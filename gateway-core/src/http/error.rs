//! HTTP error mapping utilities

use crate::providers::error::AdapterError;
use serde_json::Value;

/// Map a non-success status and its body to a raw adapter error.
///
/// The provider's machine-readable code is kept when the body has one so
/// the classifier can prefer it over message matching.
pub fn map_http_error(status: u16, body: &str) -> AdapterError {
    let details = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| extract_error_details(&v));

    let (message, code) = match details {
        Some(d) => (d.message, d.code),
        None if !body.trim().is_empty() => (truncate(body.trim(), 512), None),
        None => (format!("HTTP error {}", status), None),
    };

    AdapterError::Status {
        status,
        message,
        code,
    }
}

/// Map a transport-level failure from reqwest
pub fn map_transport_error(err: &reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::timeout(err.to_string())
    } else if err.is_connect() {
        AdapterError::transport(format!("Connection failed: {}", err))
    } else if err.is_decode() {
        AdapterError::decode(err.to_string())
    } else {
        AdapterError::transport(err.to_string())
    }
}

/// Error details extracted from a response body
#[derive(Debug, PartialEq)]
struct ErrorDetails {
    message: String,
    code: Option<String>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI: { "error": { "message", "type", "code" } }
    // Anthropic: { "type": "error", "error": { "type", "message" } }
    if let Some(error) = json.get("error").filter(|e| e.is_object()) {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .or_else(|| error.get("type").and_then(Value::as_str))
                .map(str::to_string);
            return Some(ErrorDetails {
                message: message.to_string(),
                code,
            });
        }
    }

    // HuggingFace: { "error": "Model x is currently loading", "estimated_time": 20.0 }
    if let Some(error) = json.get("error").and_then(Value::as_str) {
        return Some(ErrorDetails {
            message: error.to_string(),
            code: json
                .get("error_type")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    // Generic: { "message": "...", "code": "..." }
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return Some(ErrorDetails {
            message: message.to_string(),
            code: json.get("code").and_then(Value::as_str).map(str::to_string),
        });
    }

    None
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
