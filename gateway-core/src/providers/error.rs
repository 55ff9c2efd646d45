//! Raw adapter error types
//!
//! Adapters surface failures as [`AdapterError`]; the service manager is the
//! single place where these are turned into a
//! [`ClassifiedError`](crate::classify::ClassifiedError).

use crate::protocol::Operation;
use thiserror::Error;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur when talking to a provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// No HTTP response at all (DNS, refused connection, reset)
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The transport gave up waiting
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// The provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Machine-readable code from the error body, when present
        code: Option<String>,
    },

    /// The response arrived but could not be decoded into the expected shape
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    /// The caller's input was rejected before any network call
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The adapter does not implement the operation
    #[error("Operation '{operation}' is not supported by this provider")]
    Unsupported { operation: Operation },
}

impl AdapterError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Status code fed to the classifier.
    ///
    /// `Some(0)` means the call never got an HTTP response; `None` means
    /// the failure has no status at all and is classified from call-site
    /// context instead.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => Some(0),
            Self::Timeout { .. } => Some(408),
            Self::Status { status, .. } => Some(*status),
            Self::InvalidInput { .. } => Some(400),
            Self::Unsupported { .. } => Some(405),
            Self::Decode { .. } => None,
        }
    }

    /// Provider's machine-readable error code, if the body carried one
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The bare message, without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Self::Transport { message }
            | Self::Timeout { message }
            | Self::Status { message, .. }
            | Self::Decode { message }
            | Self::InvalidInput { message } => message.clone(),
            Self::Unsupported { operation } => format!("{} not supported", operation),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_projection() {
        assert_eq!(AdapterError::transport("refused").status_code(), Some(0));
        assert_eq!(AdapterError::timeout("slow").status_code(), Some(408));
        assert_eq!(AdapterError::status(429, "slow down").status_code(), Some(429));
        assert_eq!(AdapterError::invalid_input("empty").status_code(), Some(400));
        assert_eq!(
            AdapterError::Unsupported {
                operation: Operation::Classify
            }
            .status_code(),
            Some(405)
        );
        assert_eq!(AdapterError::decode("eof").status_code(), None);
    }

    #[test]
    fn test_unsupported_message_mentions_operation() {
        let err = AdapterError::Unsupported {
            operation: Operation::GenerateKeywords,
        };
        assert_eq!(err.message(), "generate_keywords not supported");
        assert!(err.to_string().contains("generate_keywords"));
    }

    #[test]
    fn test_json_error_becomes_decode() {
        let err: AdapterError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AdapterError::Decode { .. }));
    }
}
