//! HTTP layer shared by the concrete adapters
//!
//! This module implements the transport for provider adapters, handling:
//! - Connection pooling and client management
//! - Request correlation ids and idempotency keys
//! - Reporting every request, response and failure to the request logger
//! - Mapping non-success responses to raw adapter errors

pub mod client;
pub mod error;

pub use client::HttpClient;

use crate::protocol::{Options, DEFAULT_TIMEOUT};
use std::time::Duration;

/// HTTP method used by an adapter call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Transport options derived from the caller's [`Options`]
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Request timeout
    pub timeout: Duration,

    /// Optional idempotency key for safe retries
    pub idempotency_key: Option<String>,

    /// Force request/response tracing for this call
    pub debug: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            idempotency_key: None,
            debug: false,
        }
    }
}

impl RequestOptions {
    /// Derive transport options, using `default_timeout` when the caller
    /// did not set one
    pub fn from_options(options: &Options, default_timeout: Duration) -> Self {
        Self {
            timeout: options.timeout().unwrap_or(default_timeout),
            idempotency_key: options.idempotency_key().map(str::to_string),
            debug: options.debug(),
        }
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set an idempotency key for safe retries
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options_from_caller_options() {
        let options = Options::new()
            .with("timeout", 3.0)
            .with("idempotency_key", "job-42")
            .with("debug", true);
        let request = RequestOptions::from_options(&options, Duration::from_secs(30));

        assert_eq!(request.timeout, Duration::from_secs(3));
        assert_eq!(request.idempotency_key.as_deref(), Some("job-42"));
        assert!(request.debug);
    }

    #[test]
    fn test_request_options_default_timeout() {
        let request = RequestOptions::from_options(&Options::new(), Duration::from_secs(7));
        assert_eq!(request.timeout, Duration::from_secs(7));
        assert!(request.idempotency_key.is_none());

        let huge = Options::new().with("timeout", 1e300);
        let request = RequestOptions::from_options(&huge, Duration::from_secs(7));
        assert_eq!(request.timeout, Duration::from_secs(7));
    }
}
