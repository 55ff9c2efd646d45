//! Static code tables used by the classifier
//!
//! Each level has an ordered list of codes. Order matters twice: the first
//! entry whose description or pattern occurs in the message wins, and the
//! first entry of a level is the fallback when nothing matches.

use super::ErrorLevel;

/// One classifiable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSpec {
    /// Machine-readable code, e.g. `rate_limit_exceeded`
    pub code: &'static str,
    /// Short human description; also matched against the message
    pub description: &'static str,
    /// Additional lowercase substrings that select this code
    pub patterns: &'static [&'static str],
    /// Operator-facing recovery guidance
    pub recovery: &'static str,
}

impl CodeSpec {
    /// Case-insensitive match against an already-lowercased message
    pub fn matches(&self, lower_message: &str) -> bool {
        if lower_message.is_empty() {
            return false;
        }
        lower_message.contains(&self.description.to_lowercase())
            || self.patterns.iter().any(|p| lower_message.contains(p))
    }
}

const fn entry(
    code: &'static str,
    description: &'static str,
    patterns: &'static [&'static str],
    recovery: &'static str,
) -> CodeSpec {
    CodeSpec {
        code,
        description,
        patterns,
        recovery,
    }
}

const NETWORK: &[CodeSpec] = &[
    entry(
        "connection_error",
        "Connection failed",
        &["connection", "connect", "dns", "refused", "reset by peer", "unreachable"],
        "Check network connectivity and the provider base URL, then retry with backoff",
    ),
    entry(
        "timeout",
        "Request timed out",
        &["timed out", "timeout", "deadline"],
        "Retry with backoff; consider a longer timeout for large inputs",
    ),
    entry(
        "service_unavailable",
        "Service unavailable",
        &["unavailable", "bad gateway", "upstream"],
        "The provider is temporarily unavailable; retry after a short delay",
    ),
];

const AUTH: &[CodeSpec] = &[
    entry(
        "invalid_api_key",
        "Invalid API key",
        &[
            "invalid_api_key",
            "incorrect api key",
            "invalid x-api-key",
            "unauthorized",
            "authentication failed",
            "invalid authentication",
        ],
        "Verify the API key configured for this provider",
    ),
    entry(
        "expired_credentials",
        "Credentials expired",
        &["expired"],
        "Rotate or refresh the provider credentials",
    ),
    entry(
        "permission_denied",
        "Permission denied",
        &["permission", "forbidden", "not allowed", "access denied"],
        "Check that the account has access to the requested model or operation",
    ),
    // Precedes quota_exceeded: a message naming both is a throttle
    entry(
        "rate_limit_exceeded",
        "Rate limit exceeded",
        &["rate limit", "rate_limit", "too many requests", "slow down"],
        "Wait before retrying and reduce the request rate",
    ),
    entry(
        "quota_exceeded",
        "Quota exceeded",
        &["quota", "billing"],
        "Check the account's billing and usage limits",
    ),
];

const REQUEST: &[CodeSpec] = &[
    entry(
        "invalid_params",
        "Invalid parameters",
        &[
            "invalid param",
            "invalid_param",
            "invalid value",
            "invalid argument",
            "missing required",
            "unrecognized request argument",
        ],
        "Check the request parameters against the provider documentation",
    ),
    entry(
        "payload_too_large",
        "Payload too large",
        &["too large", "too long", "context length", "maximum context", "token limit"],
        "Reduce the input size or split the text into chunks",
    ),
    entry(
        "unsupported_operation",
        "Operation not supported",
        &["not supported", "unsupported operation"],
        "Use a provider that supports this operation",
    ),
    entry(
        "method_not_allowed",
        "Method not allowed",
        &[],
        "Check the endpoint and HTTP method used by the adapter",
    ),
    entry(
        "unsupported_media_type",
        "Unsupported media type",
        &["media type", "content-type", "content type"],
        "Send JSON with the content type the provider expects",
    ),
    entry(
        "invalid_request",
        "Invalid request",
        &["bad request", "malformed", "unprocessable"],
        "Fix the request before resending; retrying it unchanged will fail again",
    ),
];

const PROVIDER: &[CodeSpec] = &[
    entry(
        "unknown_error",
        "Unknown provider error",
        &[],
        "Inspect the provider response in the debug log and retry later",
    ),
    entry(
        "server_error",
        "Internal server error",
        &["server error", "server_error", "internal error"],
        "The provider failed internally; retry later",
    ),
    entry(
        "overloaded",
        "Provider overloaded",
        &["overloaded", "capacity"],
        "Retry after a delay or send the request to another provider",
    ),
    entry(
        "model_not_found",
        "Model not found",
        &["model_not_found", "does not exist", "no such model", "unknown model"],
        "Select a model available to this account",
    ),
    entry(
        "not_implemented",
        "Not implemented",
        &[],
        "Use another provider or endpoint for this operation",
    ),
    entry(
        "insufficient_storage",
        "Insufficient storage",
        &[],
        "Retry later; the provider cannot store the request right now",
    ),
    entry(
        "quota_exceeded",
        "Quota exceeded",
        &["quota", "billing"],
        "Check the account's billing and usage limits",
    ),
    entry(
        "content_policy_violation",
        "Content policy violation",
        &["content policy", "content_policy", "policy violation", "safety system"],
        "Revise the content to comply with the provider's usage policy",
    ),
    entry(
        "content_filtered",
        "Content filtered",
        &["content filter", "content_filter", "filtered", "flagged"],
        "The output was filtered; adjust the input or use another provider",
    ),
];

const RESPONSE: &[CodeSpec] = &[
    entry(
        "invalid_response",
        "Invalid response format",
        &["invalid json", "failed to parse", "parse error", "decode", "deserialize", "unexpected"],
        "The response shape was unexpected; check adapter compatibility with the provider API version",
    ),
    entry(
        "empty_response",
        "Empty response",
        &["empty", "no content", "no choices"],
        "The provider returned no usable content; retrying with the same input rarely helps",
    ),
    entry(
        "missing_field",
        "Missing field",
        &[],
        "The provider omitted a required field; check for API changes",
    ),
];

const OPENAI_REQUEST: &[CodeSpec] = &[entry(
    "context_length_exceeded",
    "Context length exceeded",
    &["context_length_exceeded", "maximum context length"],
    "Shorten the input or pick a model with a larger context window",
)];

const ANTHROPIC_PROVIDER: &[CodeSpec] = &[entry(
    "overloaded",
    "Anthropic API overloaded",
    &["overloaded_error", "overloaded"],
    "Anthropic is shedding load; retry after a delay",
)];

const HUGGINGFACE_NETWORK: &[CodeSpec] = &[entry(
    "model_loading",
    "Model is loading",
    &["currently loading", "is loading"],
    "Wait for the model to finish loading (see estimated_time) and retry",
)];

/// Generic codes for a level, in match order
pub fn generic_codes(level: ErrorLevel) -> &'static [CodeSpec] {
    match level {
        ErrorLevel::Network => NETWORK,
        ErrorLevel::Auth => AUTH,
        ErrorLevel::Request => REQUEST,
        ErrorLevel::Provider => PROVIDER,
        ErrorLevel::Response => RESPONSE,
    }
}

/// Provider-specific codes, searched before the generic table
pub fn provider_codes(provider: &str, level: ErrorLevel) -> &'static [CodeSpec] {
    match (provider, level) {
        ("openai", ErrorLevel::Request) => OPENAI_REQUEST,
        ("anthropic", ErrorLevel::Provider) => ANTHROPIC_PROVIDER,
        ("huggingface", ErrorLevel::Network) => HUGGINGFACE_NETWORK,
        _ => &[],
    }
}

/// Built-in mapping from a provider's structured error code to ours
pub fn builtin_alias(provider: &str, provider_code: &str) -> Option<&'static str> {
    let code = match (provider, provider_code) {
        ("openai", "invalid_api_key") => "invalid_api_key",
        ("openai", "insufficient_quota") => "quota_exceeded",
        ("openai", "rate_limit_exceeded") => "rate_limit_exceeded",
        ("openai", "context_length_exceeded") => "context_length_exceeded",
        ("openai", "model_not_found") => "model_not_found",
        ("openai", "content_filter") => "content_filtered",
        ("openai", "content_policy_violation") => "content_policy_violation",
        ("openai", "server_error") => "server_error",
        ("anthropic", "authentication_error") => "invalid_api_key",
        ("anthropic", "permission_error") => "permission_denied",
        ("anthropic", "rate_limit_error") => "rate_limit_exceeded",
        ("anthropic", "overloaded_error") => "overloaded",
        ("anthropic", "not_found_error") => "model_not_found",
        ("anthropic", "request_too_large") => "payload_too_large",
        ("anthropic", "api_error") => "server_error",
        _ => return None,
    };
    Some(code)
}

/// Fixed status to level table; unmapped statuses are provider faults
pub fn status_level(status: u16) -> ErrorLevel {
    match status {
        0 | 408 | 502 | 503 | 504 => ErrorLevel::Network,
        401 | 403 | 429 => ErrorLevel::Auth,
        400 | 405 | 413 | 415 | 422 => ErrorLevel::Request,
        500 | 501 | 507 => ErrorLevel::Provider,
        _ => ErrorLevel::Provider,
    }
}

/// Code used for a status when no message pattern matched
pub fn status_default_code(status: u16) -> Option<&'static str> {
    let code = match status {
        0 => "connection_error",
        408 | 504 => "timeout",
        502 | 503 => "service_unavailable",
        401 => "invalid_api_key",
        403 => "permission_denied",
        429 => "rate_limit_exceeded",
        405 => "method_not_allowed",
        413 => "payload_too_large",
        415 => "unsupported_media_type",
        422 => "invalid_params",
        500 => "server_error",
        501 => "not_implemented",
        507 => "insufficient_storage",
        _ => return None,
    };
    Some(code)
}
