//! Errors returned by the service manager

use crate::classify::ClassifiedError;
use crate::protocol::Operation;
use thiserror::Error;

/// Result type for manager calls
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why an invocation did not produce a result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// No adapter is registered under this id
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The adapter's capability set does not include the operation
    #[error("Provider '{provider}' does not support operation '{operation}'")]
    UnsupportedOperation {
        provider: String,
        operation: Operation,
    },

    /// No registered adapter supports the operation
    #[error("No registered provider supports operation '{0}'")]
    NoCapableProvider(Operation),

    /// The caller cancelled the call before it finished
    #[error("Operation '{operation}' on provider '{provider}' was cancelled")]
    Cancelled {
        provider: String,
        operation: Operation,
    },

    /// The adapter failed; the failure has been classified and logged
    #[error(transparent)]
    Classified(Box<InvocationFailure>),
}

impl GatewayError {
    /// The classified failure, if the adapter was actually called
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            GatewayError::Classified(failure) => Some(&failure.error),
            _ => None,
        }
    }

    /// See [`InvocationFailure::retry_allowed`]; false for every other variant
    pub fn retry_allowed(&self) -> bool {
        match self {
            GatewayError::Classified(failure) => failure.retry_allowed(),
            _ => false,
        }
    }
}

impl From<InvocationFailure> for GatewayError {
    fn from(failure: InvocationFailure) -> Self {
        GatewayError::Classified(Box::new(failure))
    }
}

/// A classified failure plus the call facts needed to decide on a retry
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct InvocationFailure {
    pub error: ClassifiedError,
    pub operation: Operation,
    /// Idempotency key the call was sent with, if any
    pub idempotency_key: Option<String>,
}

impl InvocationFailure {
    /// Whether the caller may safely re-send the call.
    ///
    /// Requires `retry_recommended`, and for operations with provider-side
    /// effects (everything but the read-only probes) an idempotency key.
    pub fn retry_allowed(&self) -> bool {
        self.error.retry_recommended
            && (self.operation.is_read_only() || self.idempotency_key.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClassifier;

    fn failure(operation: Operation, key: Option<&str>, status: u16) -> InvocationFailure {
        InvocationFailure {
            error: ErrorClassifier::new().classify("openai", Some(status), "upstream trouble"),
            operation,
            idempotency_key: key.map(str::to_string),
        }
    }

    #[test]
    fn test_content_retry_needs_idempotency_key() {
        assert!(!failure(Operation::Summarize, None, 503).retry_allowed());
        assert!(failure(Operation::Summarize, Some("job-1"), 503).retry_allowed());
    }

    #[test]
    fn test_read_only_retry_needs_no_key() {
        assert!(failure(Operation::GetModels, None, 503).retry_allowed());
    }

    #[test]
    fn test_key_does_not_override_advice() {
        assert!(!failure(Operation::Summarize, Some("job-1"), 400).retry_allowed());
    }

    #[test]
    fn test_gateway_error_accessors() {
        let err: GatewayError = failure(Operation::Classify, None, 429).into();
        assert_eq!(err.classified().map(|e| e.code.as_str()), Some("rate_limit_exceeded"));
        assert!(!err.retry_allowed());
        assert!(GatewayError::UnknownProvider("x".into()).classified().is_none());
    }
}
