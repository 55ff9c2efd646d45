//! External structured sink for error entries

use crate::classify::{ClassifiedError, ErrorLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape forwarded to an external sink for every logged error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub provider: String,
    /// Unset for raw errors that have not been classified yet
    pub level: Option<ErrorLevel>,
    pub code: Option<String>,
    pub message: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    /// One-line rendering used when no sink is configured
    pub fn plain_line(&self) -> String {
        let level = self.level.map(|l| l.as_str()).unwrap_or("unclassified");
        let code = self.code.as_deref().unwrap_or("-");
        format!(
            "{} [{}] {}/{} status={}: {}",
            self.timestamp.to_rfc3339(),
            self.provider,
            level,
            code,
            self.status_code,
            self.message
        )
    }
}

impl From<&ClassifiedError> for ErrorReport {
    fn from(error: &ClassifiedError) -> Self {
        Self {
            provider: error.provider.clone(),
            level: Some(error.level),
            code: Some(error.code.clone()),
            message: error.message.clone(),
            status_code: error.status_code,
            timestamp: error.timestamp,
        }
    }
}

/// Receiver for error reports, e.g. a log shipper or metrics bridge
pub trait ErrorSink: Send + Sync {
    fn record(&self, report: &ErrorReport);
}

/// Sink that emits each report as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn record(&self, report: &ErrorReport) {
        tracing::error!(
            provider = %report.provider,
            error_level = report.level.map(|l| l.as_str()).unwrap_or("unclassified"),
            code = report.code.as_deref().unwrap_or("-"),
            status = report.status_code,
            timestamp = %report.timestamp.to_rfc3339(),
            "{}",
            report.message
        );
    }
}
