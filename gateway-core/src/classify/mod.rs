//! Error classification
//!
//! Maps a raw failure `(provider, status, message)` to a [`ClassifiedError`]
//! carrying a level, a short code, retry advice and recovery guidance.
//!
//! Classification by message matching is heuristic: the code is the first
//! table entry whose description or pattern occurs in the message, which is
//! best-effort and can pick a less specific code than the provider meant.
//! When the provider supplies a machine-readable error code,
//! [`ErrorClassifier::classify_adapter_error`] prefers it over the message.

pub mod codes;

use crate::providers::error::AdapterError;
use chrono::{DateTime, Utc};
use codes::CodeSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Where in the call lifecycle a failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    /// Transport never completed (no response, timeout, gateway errors)
    Network,
    /// Credentials, permissions or rate limits
    Auth,
    /// The caller sent something the provider rejects
    Request,
    /// The provider failed to process a valid request
    Provider,
    /// The provider answered with something we cannot use
    Response,
}

impl ErrorLevel {
    pub const ALL: [ErrorLevel; 5] = [
        ErrorLevel::Network,
        ErrorLevel::Auth,
        ErrorLevel::Request,
        ErrorLevel::Provider,
        ErrorLevel::Response,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Network => "network",
            ErrorLevel::Auth => "auth",
            ErrorLevel::Request => "request",
            ErrorLevel::Provider => "provider",
            ErrorLevel::Response => "response",
        }
    }

    /// Prefix used in human descriptions
    pub fn label(&self) -> &'static str {
        match self {
            ErrorLevel::Network => "Network error",
            ErrorLevel::Auth => "Authentication error",
            ErrorLevel::Request => "Request error",
            ErrorLevel::Provider => "Provider error",
            ErrorLevel::Response => "Response error",
        }
    }

    /// Level for an optional status code.
    ///
    /// A missing status means the failure is semantic rather than transport
    /// related, so it lands on `Provider`.
    pub fn from_status(status_code: Option<u16>) -> Self {
        match status_code {
            Some(status) => codes::status_level(status),
            None => ErrorLevel::Provider,
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth codes that are worth retrying
const RETRYABLE_AUTH_CODES: &[&str] = &["rate_limit_exceeded"];

/// Provider codes that reject the request permanently
const PERMANENT_PROVIDER_CODES: &[&str] = &[
    "quota_exceeded",
    "content_policy_violation",
    "content_filtered",
    "model_not_found",
    "not_implemented",
];

/// Retry advice as a function of level and code only
pub fn retry_recommended(level: ErrorLevel, code: &str) -> bool {
    match level {
        ErrorLevel::Network => true,
        ErrorLevel::Auth => RETRYABLE_AUTH_CODES.contains(&code),
        ErrorLevel::Request | ErrorLevel::Response => false,
        ErrorLevel::Provider => !PERMANENT_PROVIDER_CODES.contains(&code),
    }
}

/// A failure with level, code and guidance attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("[{provider}] {description} ({code}): {message}")]
pub struct ClassifiedError {
    pub provider: String,
    /// HTTP-like status, 0 when there was none
    pub status_code: u16,
    pub level: ErrorLevel,
    pub code: String,
    /// Original failure text
    pub message: String,
    pub description: String,
    pub retry_recommended: bool,
    pub recovery_strategy: String,
    pub timestamp: DateTime<Utc>,
}

/// Stateless-per-call classifier shared across providers
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    /// provider id -> (provider error code -> our code)
    aliases: HashMap<String, HashMap<String, String>>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a provider's structured error code onto one of our codes.
    ///
    /// Registered aliases take precedence over the built-in ones. The
    /// alias only applies when the target code exists at the level the
    /// status resolves to.
    pub fn with_alias(
        mut self,
        provider: impl Into<String>,
        provider_code: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.aliases
            .entry(provider.into())
            .or_default()
            .insert(provider_code.into().to_lowercase(), code.into());
        self
    }

    /// Classify from status and message alone.
    ///
    /// Pure in `(provider, status_code, message)`: the same inputs always
    /// produce the same level, code and advice.
    pub fn classify(
        &self,
        provider: &str,
        status_code: Option<u16>,
        message: &str,
    ) -> ClassifiedError {
        let level = ErrorLevel::from_status(status_code);
        self.classify_at_level(provider, level, status_code, message)
    }

    /// Classify when the call site already knows the level, e.g. a body
    /// that failed to decode is a `Response` fault whatever its status.
    pub fn classify_at_level(
        &self,
        provider: &str,
        level: ErrorLevel,
        status_code: Option<u16>,
        message: &str,
    ) -> ClassifiedError {
        let spec = resolve_by_message(provider, level, status_code, message);
        build(provider, level, status_code, message, spec)
    }

    /// Classify an adapter failure, preferring the provider's structured
    /// error code and falling back to message matching.
    pub fn classify_adapter_error(&self, provider: &str, error: &AdapterError) -> ClassifiedError {
        let status_code = error.status_code();
        let level = match error {
            AdapterError::Decode { .. } => ErrorLevel::Response,
            _ => ErrorLevel::from_status(status_code),
        };
        let message = error.message();

        let spec = error
            .provider_code()
            .and_then(|code| self.resolve_structured(provider, level, code))
            .unwrap_or_else(|| resolve_by_message(provider, level, status_code, &message));

        build(provider, level, status_code, &message, spec)
    }

    fn resolve_structured(
        &self,
        provider: &str,
        level: ErrorLevel,
        provider_code: &str,
    ) -> Option<&'static CodeSpec> {
        let provider_code = provider_code.to_lowercase();
        let registered = self
            .aliases
            .get(provider)
            .and_then(|aliases| aliases.get(&provider_code))
            .map(String::as_str);

        registered
            .or_else(|| codes::builtin_alias(provider, &provider_code))
            .and_then(|code| find_code(provider, level, code))
            .or_else(|| find_code(provider, level, &provider_code))
    }
}

fn level_tables(provider: &str, level: ErrorLevel) -> impl Iterator<Item = &'static CodeSpec> {
    codes::provider_codes(provider, level)
        .iter()
        .chain(codes::generic_codes(level).iter())
}

fn find_code(provider: &str, level: ErrorLevel, code: &str) -> Option<&'static CodeSpec> {
    level_tables(provider, level).find(|spec| spec.code == code)
}

fn resolve_by_message(
    provider: &str,
    level: ErrorLevel,
    status_code: Option<u16>,
    message: &str,
) -> &'static CodeSpec {
    let lower = message.to_lowercase();
    level_tables(provider, level)
        .find(|spec| spec.matches(&lower))
        .or_else(|| {
            status_code
                .filter(|status| codes::status_level(*status) == level)
                .and_then(codes::status_default_code)
                .and_then(|code| find_code(provider, level, code))
        })
        .unwrap_or(&codes::generic_codes(level)[0])
}

fn build(
    provider: &str,
    level: ErrorLevel,
    status_code: Option<u16>,
    message: &str,
    spec: &CodeSpec,
) -> ClassifiedError {
    ClassifiedError {
        provider: provider.to_string(),
        status_code: status_code.unwrap_or(0),
        level,
        code: spec.code.to_string(),
        message: message.to_string(),
        description: format!("{}: {}", level.label(), spec.description),
        retry_recommended: retry_recommended(level, spec.code),
        recovery_strategy: spec.recovery.to_string(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Operation;

    #[test]
    fn test_rate_limit_scenario() {
        let err = ErrorClassifier::new().classify("openai", Some(429), "rate limit exceeded");
        assert_eq!(err.level, ErrorLevel::Auth);
        assert_eq!(err.code, "rate_limit_exceeded");
        assert!(err.retry_recommended);
        assert_eq!(err.status_code, 429);
    }

    #[test]
    fn test_invalid_params_scenario() {
        let err = ErrorClassifier::new().classify("openai", Some(400), "invalid parameters");
        assert_eq!(err.level, ErrorLevel::Request);
        assert_eq!(err.code, "invalid_params");
        assert!(!err.retry_recommended);
    }

    #[test]
    fn test_missing_status_is_provider_level() {
        let err = ErrorClassifier::new().classify("openai", None, "something odd happened");
        assert_eq!(err.level, ErrorLevel::Provider);
        assert_eq!(err.code, "unknown_error");
        assert_eq!(err.status_code, 0);
        assert!(err.retry_recommended);
    }

    #[test]
    fn test_unmapped_status_defaults_to_provider() {
        let err = ErrorClassifier::new().classify("custom", Some(418), "teapot");
        assert_eq!(err.level, ErrorLevel::Provider);
        assert_eq!(err.code, "unknown_error");
    }

    #[test]
    fn test_invalid_key_not_retried() {
        let err = ErrorClassifier::new().classify("anthropic", Some(401), "invalid x-api-key");
        assert_eq!(err.level, ErrorLevel::Auth);
        assert_eq!(err.code, "invalid_api_key");
        assert!(!err.retry_recommended);
    }

    #[test]
    fn test_status_default_used_when_message_is_opaque() {
        let err = ErrorClassifier::new().classify("openai", Some(429), "please wait");
        assert_eq!(err.code, "rate_limit_exceeded");
        assert!(err.retry_recommended);

        let err = ErrorClassifier::new().classify("openai", Some(500), "oops");
        assert_eq!(err.code, "server_error");
    }

    #[test]
    fn test_permanent_provider_rejections() {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify("openai", Some(500), "flagged by content filter");
        assert_eq!(err.code, "content_filtered");
        assert!(!err.retry_recommended);

        let err = classifier.classify("openai", None, "content policy violation detected");
        assert_eq!(err.code, "content_policy_violation");
        assert!(!err.retry_recommended);
    }

    #[test]
    fn test_provider_table_searched_first() {
        let err = ErrorClassifier::new().classify(
            "huggingface",
            Some(503),
            "Model facebook/bart-large-cnn is currently loading",
        );
        assert_eq!(err.level, ErrorLevel::Network);
        assert_eq!(err.code, "model_loading");
        assert!(err.retry_recommended);
    }

    #[test]
    fn test_structured_code_preferred_over_message() {
        let error = AdapterError::Status {
            status: 429,
            message: "You exceeded your current plan, please slow down".to_string(),
            code: Some("insufficient_quota".to_string()),
        };
        let err = ErrorClassifier::new().classify_adapter_error("openai", &error);
        assert_eq!(err.level, ErrorLevel::Auth);
        assert_eq!(err.code, "quota_exceeded");
        assert!(!err.retry_recommended);
    }

    #[test]
    fn test_structured_code_for_wrong_level_falls_back() {
        // overloaded is a provider-level code; at 429 it cannot apply
        let error = AdapterError::Status {
            status: 429,
            message: "rate limit reached".to_string(),
            code: Some("overloaded_error".to_string()),
        };
        let err = ErrorClassifier::new().classify_adapter_error("anthropic", &error);
        assert_eq!(err.code, "rate_limit_exceeded");
    }

    #[test]
    fn test_registered_alias() {
        let classifier = ErrorClassifier::new().with_alias("acme", "E_THROTTLE", "rate_limit_exceeded");
        let error = AdapterError::Status {
            status: 429,
            message: "nope".to_string(),
            code: Some("e_throttle".to_string()),
        };
        assert_eq!(
            classifier.classify_adapter_error("acme", &error).code,
            "rate_limit_exceeded"
        );
    }

    #[test]
    fn test_decode_error_is_response_level() {
        let error = AdapterError::decode("expected value at line 1 column 1");
        let err = ErrorClassifier::new().classify_adapter_error("openai", &error);
        assert_eq!(err.level, ErrorLevel::Response);
        assert_eq!(err.code, "invalid_response");
        assert!(!err.retry_recommended);
    }

    #[test]
    fn test_unsupported_is_request_level() {
        let error = AdapterError::Unsupported {
            operation: Operation::GenerateKeywords,
        };
        let err = ErrorClassifier::new().classify_adapter_error("huggingface", &error);
        assert_eq!(err.level, ErrorLevel::Request);
        assert_eq!(err.code, "unsupported_operation");
        assert_eq!(err.status_code, 405);
    }

    #[test]
    fn test_transport_error_is_network() {
        let error = AdapterError::transport("error sending request: connection refused");
        let err = ErrorClassifier::new().classify_adapter_error("openai", &error);
        assert_eq!(err.level, ErrorLevel::Network);
        assert_eq!(err.code, "connection_error");
        assert_eq!(err.status_code, 0);
        assert!(err.retry_recommended);
    }

    #[test]
    fn test_description_combines_level_and_code() {
        let err = ErrorClassifier::new().classify("openai", Some(504), "gateway timeout");
        assert_eq!(err.code, "timeout");
        assert_eq!(err.description, "Network error: Request timed out");
        assert!(!err.recovery_strategy.is_empty());
    }
}
