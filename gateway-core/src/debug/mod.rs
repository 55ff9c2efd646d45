//! Request/response debugger
//!
//! [`RequestLogger`] captures redacted request/response pairs and errors in
//! a bounded, most-recent-first ring buffer. Request/response tracing is
//! gated by a debug flag; errors are always recorded.

pub mod redact;
pub mod sink;

use crate::classify::{ClassifiedError, ErrorLevel};
use crate::protocol::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub use redact::REDACTED;
pub use sink::{ErrorReport, ErrorSink, TracingSink};

/// Default ring buffer capacity
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// A redacted outbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: Uuid,
    pub provider: String,
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// A redacted response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub request_id: Option<Uuid>,
    pub provider: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub duration: Duration,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A logged failure, raw or classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub provider: String,
    pub message: String,
    pub status_code: u16,
    pub duration: Option<Duration>,
    pub level: Option<ErrorLevel>,
    pub code: Option<String>,
    pub retry_recommended: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    fn report(&self) -> ErrorReport {
        ErrorReport {
            provider: self.provider.clone(),
            level: self.level,
            code: self.code.clone(),
            message: self.message.clone(),
            status_code: self.status_code,
            timestamp: self.timestamp,
        }
    }
}

/// One entry of the debug log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    Request(RequestRecord),
    Response(ResponseRecord),
    Error(ErrorRecord),
}

impl LogEntry {
    pub fn provider(&self) -> &str {
        match self {
            LogEntry::Request(r) => &r.provider,
            LogEntry::Response(r) => &r.provider,
            LogEntry::Error(e) => &e.provider,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match self {
            LogEntry::Error(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<LogEntry>,
    last_request: Option<RequestRecord>,
    last_response: Option<ResponseRecord>,
    /// Requests traced through the per-call `debug` option whose response
    /// has not arrived yet; bounded by the log capacity
    traced: VecDeque<Uuid>,
}

/// Thread-safe request/response/error debugger
pub struct RequestLogger {
    debug_enabled: AtomicBool,
    capacity: usize,
    state: Mutex<LogState>,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("debug_enabled", &self.is_debug_enabled())
            .field("capacity", &self.capacity)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RequestLogger {
    /// Create a logger with the default capacity
    pub fn new(debug_enabled: bool) -> Self {
        Self::with_capacity(debug_enabled, DEFAULT_LOG_CAPACITY)
    }

    /// Create a logger holding at most `capacity` entries (minimum 1)
    pub fn with_capacity(debug_enabled: bool, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            debug_enabled: AtomicBool::new(debug_enabled),
            capacity,
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity),
                ..Default::default()
            }),
            sink: None,
        }
    }

    /// Forward every error entry to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_debug_enabled(&self, enabled: bool) {
        self.debug_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.debug_enabled.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // A panic while holding the lock cannot leave the buffer half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(state: &mut LogState, capacity: usize, entry: LogEntry) {
        state.entries.push_front(entry);
        state.entries.truncate(capacity);
    }

    /// Record an outbound request and return its correlation id.
    ///
    /// `last_request` is always updated; the log only gets an entry when
    /// debugging is enabled globally or via the `debug` option.
    pub fn log_request(
        &self,
        provider: &str,
        endpoint: &str,
        headers: &HashMap<String, String>,
        payload: &Value,
        options: &Options,
    ) -> Uuid {
        let record = RequestRecord {
            request_id: Uuid::new_v4(),
            provider: provider.to_string(),
            endpoint: redact::scrub_text(endpoint).into_owned(),
            headers: redact::redact_headers(headers),
            payload: redact::redact_value(payload),
            timestamp: Utc::now(),
        };
        let request_id = record.request_id;
        let trace = self.is_debug_enabled() || options.debug();

        debug!(provider, endpoint = %record.endpoint, %request_id, "request");

        let mut state = self.lock();
        if trace {
            Self::push(&mut state, self.capacity, LogEntry::Request(record.clone()));
            if !self.is_debug_enabled() {
                state.traced.push_front(request_id);
                state.traced.truncate(self.capacity);
            }
        }
        state.last_request = Some(record);
        request_id
    }

    /// Record a response.
    ///
    /// `last_response` is always updated. The log gets an entry when
    /// debugging is enabled or the matching request was traced. A non-empty
    /// `error` is also recorded through [`log_error`](Self::log_error),
    /// whatever the debug flag says.
    #[allow(clippy::too_many_arguments)]
    pub fn log_response(
        &self,
        provider: &str,
        request_id: Option<Uuid>,
        status_code: u16,
        headers: &HashMap<String, String>,
        body: &Value,
        duration: Duration,
        error: Option<&str>,
    ) {
        let error = error
            .filter(|e| !e.is_empty())
            .map(|e| redact::scrub_text(e).into_owned());
        let record = ResponseRecord {
            request_id,
            provider: provider.to_string(),
            status_code,
            headers: redact::redact_headers(headers),
            body: redact::redact_value(body),
            duration,
            error: error.clone(),
            timestamp: Utc::now(),
        };

        debug!(
            provider,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "response"
        );

        self.store_response(record);

        if let Some(message) = error {
            self.log_error(provider, &message, status_code, Some(duration));
        }
    }

    /// Record a failed call whose error has already been classified.
    ///
    /// Stores the response like [`log_response`](Self::log_response) but
    /// files one classified error entry instead of a raw one.
    pub fn log_failed_response(
        &self,
        request_id: Option<Uuid>,
        error: &ClassifiedError,
        duration: Duration,
    ) {
        self.store_response(ResponseRecord {
            request_id,
            provider: error.provider.clone(),
            status_code: error.status_code,
            headers: BTreeMap::new(),
            body: Value::Null,
            duration,
            error: Some(redact::scrub_text(&error.message).into_owned()),
            timestamp: Utc::now(),
        });
        self.log_classified(error, Some(duration));
    }

    fn store_response(&self, record: ResponseRecord) {
        let mut state = self.lock();
        let traced_request = record
            .request_id
            .and_then(|id| state.traced.iter().position(|t| *t == id))
            .and_then(|at| state.traced.remove(at))
            .is_some();
        if self.is_debug_enabled() || traced_request {
            Self::push(&mut state, self.capacity, LogEntry::Response(record.clone()));
        }
        state.last_response = Some(record);
    }

    /// Record a raw error. Always stored and forwarded.
    pub fn log_error(
        &self,
        provider: &str,
        message: &str,
        status_code: u16,
        duration: Option<Duration>,
    ) {
        self.store_error(ErrorRecord {
            provider: provider.to_string(),
            message: redact::scrub_text(message).into_owned(),
            status_code,
            duration,
            level: None,
            code: None,
            retry_recommended: None,
            timestamp: Utc::now(),
        });
    }

    /// Record a classified error. Always stored and forwarded.
    pub fn log_classified(&self, error: &ClassifiedError, duration: Option<Duration>) {
        self.store_error(ErrorRecord {
            provider: error.provider.clone(),
            message: redact::scrub_text(&error.message).into_owned(),
            status_code: error.status_code,
            duration,
            level: Some(error.level),
            code: Some(error.code.clone()),
            retry_recommended: Some(error.retry_recommended),
            timestamp: error.timestamp,
        });
    }

    fn store_error(&self, record: ErrorRecord) {
        let report = record.report();
        {
            let mut state = self.lock();
            Self::push(&mut state, self.capacity, LogEntry::Error(record));
        }

        match &self.sink {
            Some(sink) => sink.record(&report),
            None => tracing::error!("{}", report.plain_line()),
        }
    }

    /// Snapshot of the log, most recent first
    pub fn get_log(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Only the error entries, most recent first
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.lock()
            .entries
            .iter()
            .filter_map(|e| e.as_error().cloned())
            .collect()
    }

    /// Drop all entries; last request/response details are kept
    pub fn clear_log(&self) {
        self.lock().entries.clear();
    }

    pub fn last_request_details(&self) -> Option<RequestRecord> {
        self.lock().last_request.clone()
    }

    pub fn last_response_details(&self) -> Option<ResponseRecord> {
        self.lock().last_response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClassifier;
    use serde_json::json;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<ErrorReport>>);

    impl ErrorSink for CollectingSink {
        fn record(&self, report: &ErrorReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    fn auth_headers() -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer sk-live-123456789".to_string());
        headers
    }

    #[test]
    fn test_request_not_logged_when_debug_disabled() {
        let logger = RequestLogger::new(false);
        logger.log_request("openai", "/chat", &auth_headers(), &json!({}), &Options::new());

        assert!(logger.get_log().is_empty());
        let last = logger.last_request_details().unwrap();
        assert_eq!(last.headers["Authorization"], REDACTED);
    }

    #[test]
    fn test_debug_option_traces_request_and_its_response() {
        let logger = RequestLogger::new(false);
        let options = Options::new().with("debug", true);
        let traced = logger.log_request("openai", "/chat", &HashMap::new(), &json!({}), &options);
        let quiet = logger.log_request("openai", "/chat", &HashMap::new(), &json!({}), &Options::new());

        logger.log_response("openai", Some(quiet), 200, &HashMap::new(), &Value::Null, Duration::ZERO, None);
        assert_eq!(logger.get_log().len(), 1);

        logger.log_response("openai", Some(traced), 200, &HashMap::new(), &json!({ "ok": true }), Duration::ZERO, None);
        let log = logger.get_log();
        assert_eq!(log.len(), 2);
        assert!(matches!(&log[0], LogEntry::Response(r) if r.request_id == Some(traced)));
        assert!(matches!(&log[1], LogEntry::Request(r) if r.request_id == traced));

        // Only the first response for a traced request is traced
        logger.log_response("openai", Some(traced), 200, &HashMap::new(), &Value::Null, Duration::ZERO, None);
        assert_eq!(logger.get_log().len(), 2);
    }

    #[test]
    fn test_payload_secret_never_stored() {
        let logger = RequestLogger::new(true);
        logger.log_request(
            "openai",
            "/chat",
            &auth_headers(),
            &json!({ "api_key": "secret123" }),
            &Options::new(),
        );

        let log = logger.get_log();
        match &log[0] {
            LogEntry::Request(r) => assert_eq!(r.payload, json!({ "api_key": "[REDACTED]" })),
            other => panic!("unexpected entry: {:?}", other),
        }
        let dump = serde_json::to_string(&log).unwrap();
        assert!(!dump.contains("secret123"));
        assert!(!dump.contains("sk-live-123456789"));
    }

    #[test]
    fn test_response_error_logged_even_when_debug_disabled() {
        let logger = RequestLogger::new(false);
        logger.log_response(
            "openai",
            None,
            500,
            &HashMap::new(),
            &Value::Null,
            Duration::from_millis(12),
            Some("upstream exploded"),
        );

        let log = logger.get_log();
        assert_eq!(log.len(), 1);
        let err = log[0].as_error().unwrap();
        assert_eq!(err.message, "upstream exploded");
        assert_eq!(err.status_code, 500);
        assert_eq!(logger.last_response_details().unwrap().status_code, 500);
    }

    #[test]
    fn test_empty_error_string_is_not_an_error() {
        let logger = RequestLogger::new(false);
        logger.log_response(
            "openai",
            None,
            200,
            &HashMap::new(),
            &json!({ "ok": true }),
            Duration::ZERO,
            Some(""),
        );
        assert!(logger.get_log().is_empty());
    }

    #[test]
    fn test_ring_buffer_keeps_most_recent() {
        let logger = RequestLogger::with_capacity(false, 5);
        for i in 0..12 {
            logger.log_error("openai", &format!("error {}", i), 500, None);
        }

        let log = logger.get_log();
        assert_eq!(log.len(), 5);
        let messages: Vec<_> = log.iter().map(|e| e.as_error().unwrap().message.clone()).collect();
        assert_eq!(messages, vec!["error 11", "error 10", "error 9", "error 8", "error 7"]);
    }

    #[test]
    fn test_classified_errors_forwarded_to_sink() {
        let sink = Arc::new(CollectingSink::default());
        let logger = RequestLogger::new(false).with_sink(sink.clone());
        let error = ErrorClassifier::new().classify("openai", Some(429), "rate limit exceeded");

        logger.log_classified(&error, Some(Duration::from_millis(40)));

        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].code.as_deref(), Some("rate_limit_exceeded"));
        let stored = logger.errors();
        assert_eq!(stored[0].retry_recommended, Some(true));
    }

    #[test]
    fn test_failed_response_files_one_classified_error() {
        let logger = RequestLogger::new(true);
        let error = ErrorClassifier::new().classify("anthropic", Some(503), "service unavailable");
        logger.log_failed_response(None, &error, Duration::from_millis(5));

        let log = logger.get_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].as_error().unwrap().code.as_deref(), Some("service_unavailable"));
        assert!(matches!(&log[1], LogEntry::Response(r) if r.status_code == 503));
        assert_eq!(logger.errors().len(), 1);
    }

    #[test]
    fn test_clear_log_keeps_last_details() {
        let logger = RequestLogger::new(true);
        logger.log_request("openai", "/chat", &HashMap::new(), &json!({}), &Options::new());
        logger.clear_log();
        assert!(logger.get_log().is_empty());
        assert!(logger.last_request_details().is_some());
    }

    #[test]
    fn test_concurrent_logging_respects_capacity() {
        let logger = Arc::new(RequestLogger::with_capacity(true, 50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        logger.log_error("openai", &format!("{}-{}", t, i), 503, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(logger.get_log().len(), 50);
    }
}
