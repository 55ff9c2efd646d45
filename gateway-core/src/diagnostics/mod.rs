//! Connection and capability diagnostics
//!
//! [`ConnectionTester`] runs health probes against an adapter with retry
//! and exponential backoff. It never fails: every outcome, including an
//! adapter that errors or hangs, is folded into a [`TestResult`].

mod backoff;

pub use backoff::BackoffPolicy;

use crate::call::{CallContext, CallOutcome};
use crate::classify::{ClassifiedError, ErrorClassifier};
use crate::config::DiagnosticsConfig;
use crate::debug::RequestLogger;
use crate::protocol::{
    ConnectionStatus, ModelInfo, Operation, OperationRequest, Options, UsageInfo, DEFAULT_TIMEOUT,
};
use crate::providers::{dispatch, ProviderAdapter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message returned when the adapter has no connection probe
pub const UNSUPPORTED_MESSAGE: &str = "Provider does not support connection testing";

/// Sample input used when probing content operations
const PROBE_TEXT: &str = "The quick brown fox jumps over the lazy dog near the river bank in Paris.";

/// Limits for one test run
#[derive(Debug, Clone)]
pub struct TestOptions {
    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retries after the first attempt
    pub retry_attempts: u32,

    /// Delay schedule between attempts
    pub backoff: BackoffPolicy,

    /// Bound on the whole run, attempts and delays included
    pub max_total: Option<Duration>,

    /// Stops the run between or during attempts
    pub cancel: Option<CancellationToken>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: 2,
            backoff: BackoffPolicy::default(),
            max_total: None,
            cancel: None,
        }
    }
}

impl TestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_total(mut self, max_total: Duration) -> Self {
        self.max_total = Some(max_total);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl From<&DiagnosticsConfig> for TestOptions {
    fn from(config: &DiagnosticsConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            retry_attempts: config.retry_attempts,
            backoff: BackoffPolicy::new(Duration::from_millis(config.backoff_base_ms)),
            max_total: config.max_total_ms.map(Duration::from_millis),
            cancel: None,
        }
    }
}

/// Outcome of a connection test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub success: bool,
    pub message: String,
    /// Latency of the last attempt
    pub latency_ms: u64,
    #[serde(default)]
    pub provider_status: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// Attempts actually made (0 when the provider cannot be tested)
    pub attempts: u32,
}

impl TestResult {
    fn new(success: bool, message: impl Into<String>, latency: Duration, attempts: u32) -> Self {
        Self {
            success,
            message: message.into(),
            latency_ms: latency.as_millis() as u64,
            provider_status: Map::new(),
            timestamp: Utc::now(),
            attempts,
        }
    }
}

/// Support and probe outcome for one content operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCheck {
    pub supported: bool,
    pub label: String,
    /// Whether a live probe ran
    pub tested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why the retry loop stopped without a success
enum Stop {
    Exhausted,
    Budget,
    Cancelled,
}

/// Health and capability prober sharing the gateway's logger and classifier
#[derive(Debug, Clone)]
pub struct ConnectionTester {
    logger: Arc<RequestLogger>,
    classifier: ErrorClassifier,
    options: TestOptions,
}

impl ConnectionTester {
    pub fn new(logger: Arc<RequestLogger>, classifier: ErrorClassifier) -> Self {
        Self {
            logger,
            classifier,
            options: TestOptions::default(),
        }
    }

    /// Default limits used by [`run_test`](Self::run_test)
    pub fn with_options(mut self, options: TestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    fn context<'a>(
        &'a self,
        adapter: &'a dyn ProviderAdapter,
        operation: Operation,
        timeout: Duration,
        cancel: Option<&'a CancellationToken>,
    ) -> CallContext<'a> {
        CallContext {
            logger: &self.logger,
            classifier: &self.classifier,
            provider: adapter.id(),
            operation,
            timeout,
            cancel,
        }
    }

    /// Run a connection test with the tester's default limits
    pub async fn run_test(&self, adapter: &dyn ProviderAdapter) -> TestResult {
        self.run_test_with(adapter, &self.options).await
    }

    /// Run a connection test.
    ///
    /// Makes up to `retry_attempts + 1` attempts, sleeping
    /// `backoff.delay(n)` before retry `n`, and stops at the first success.
    pub async fn run_test_with(
        &self,
        adapter: &dyn ProviderAdapter,
        options: &TestOptions,
    ) -> TestResult {
        let provider = adapter.id();
        if !adapter
            .declared_operations()
            .contains(&Operation::TestConnection)
        {
            debug!(provider, "connection test skipped: not supported");
            return TestResult::new(false, UNSUPPORTED_MESSAGE, Duration::ZERO, 0);
        }

        let started = Instant::now();
        let max_attempts = options.retry_attempts.saturating_add(1);
        let mut attempts = 0;
        let mut last = TestResult::new(false, "No attempt made", Duration::ZERO, 0);

        let stop = loop {
            if attempts >= max_attempts {
                break Stop::Exhausted;
            }

            if attempts > 0 {
                let delay = options.backoff.delay(attempts);
                if exceeds_budget(options.max_total, started.elapsed() + delay) {
                    break Stop::Budget;
                }
                debug!(provider, retry = attempts, delay_ms = delay.as_millis() as u64, "backing off");
                if !sleep_unless_cancelled(delay, options.cancel.as_ref()).await {
                    break Stop::Cancelled;
                }
            }

            let timeout = match options.max_total {
                Some(max_total) => options.timeout.min(max_total.saturating_sub(started.elapsed())),
                None => options.timeout,
            };
            if timeout.is_zero() {
                break Stop::Budget;
            }

            attempts += 1;
            let payload = json!({ "attempt": attempts });
            let ctx = self.context(adapter, Operation::TestConnection, timeout, options.cancel.as_ref());
            let (outcome, latency) = ctx
                .run(&payload, &Options::new(), adapter.test_connection())
                .await;

            match outcome {
                CallOutcome::Completed(status) if status.success => {
                    info!(provider, attempts, latency_ms = latency.as_millis() as u64, "connection test passed");
                    let mut result = TestResult::new(true, status.message, latency, attempts);
                    result.provider_status = status.provider_status;
                    return result;
                }
                CallOutcome::Completed(status) => {
                    let classified = self.classify_status(provider, &status);
                    self.logger.log_classified(&classified, Some(latency));
                    last = failed_result(status.message, status.provider_status, &classified, latency, attempts);
                }
                CallOutcome::Failed(classified) => {
                    last = failed_result(
                        classified.message.clone(),
                        Map::new(),
                        &classified,
                        latency,
                        attempts,
                    );
                }
                CallOutcome::Cancelled => break Stop::Cancelled,
            }
        };

        last.attempts = attempts;
        last.timestamp = Utc::now();
        match stop {
            Stop::Exhausted => {}
            Stop::Budget => last.message = format!("{} (stopped: time budget exhausted)", last.message),
            Stop::Cancelled => last.message = format!("{} (stopped: cancelled)", last.message),
        }
        warn!(provider, attempts, reason = %last.message, "connection test failed");
        last
    }

    /// A failed self-report is classified from its status code, when the
    /// adapter put one in `provider_status`
    fn classify_status(&self, provider: &str, status: &ConnectionStatus) -> ClassifiedError {
        let status_code = status
            .provider_status
            .get("status_code")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());
        self.classifier.classify(provider, status_code, &status.message)
    }

    /// Structural and self-reported support for each content operation
    pub async fn test_capabilities(
        &self,
        adapter: &dyn ProviderAdapter,
    ) -> BTreeMap<Operation, CapabilityCheck> {
        self.capability_report(adapter, false).await
    }

    /// Like [`test_capabilities`](Self::test_capabilities), but also runs
    /// each supported operation once against a sample text
    pub async fn probe_capabilities(
        &self,
        adapter: &dyn ProviderAdapter,
    ) -> BTreeMap<Operation, CapabilityCheck> {
        self.capability_report(adapter, true).await
    }

    async fn capability_report(
        &self,
        adapter: &dyn ProviderAdapter,
        probe: bool,
    ) -> BTreeMap<Operation, CapabilityCheck> {
        let declared = adapter.declared_operations();

        // The self-report may only add support
        let ctx = self.context(adapter, Operation::GetCapabilities, self.options.timeout, None);
        let reported = match ctx
            .run(&Value::Null, &Options::new(), adapter.get_capabilities())
            .await
        {
            (CallOutcome::Completed(capabilities), _) => Some(capabilities),
            _ => None,
        };

        let mut report = BTreeMap::new();
        for operation in Operation::CONTENT {
            let supported = declared.contains(&operation)
                || reported.as_ref().is_some_and(|c| c.supports(operation));
            let mut check = CapabilityCheck {
                supported,
                label: operation.label().to_string(),
                tested: false,
                success: None,
                message: None,
            };

            if probe && supported {
                let (success, message) = self.probe(adapter, operation).await;
                check.tested = true;
                check.success = Some(success);
                check.message = Some(message);
            }
            report.insert(operation, check);
        }
        report
    }

    async fn probe(&self, adapter: &dyn ProviderAdapter, operation: Operation) -> (bool, String) {
        let request = match operation {
            Operation::Summarize => OperationRequest::summarize(PROBE_TEXT),
            Operation::ExtractEntities => OperationRequest::extract_entities(PROBE_TEXT),
            Operation::Classify => OperationRequest::classify(
                PROBE_TEXT,
                vec!["animals".to_string(), "finance".to_string()],
            ),
            Operation::GenerateKeywords => OperationRequest::generate_keywords(PROBE_TEXT),
            _ => OperationRequest::score_quality(PROBE_TEXT),
        };

        let ctx = self.context(adapter, operation, self.options.timeout, None);
        match ctx
            .run(&request.log_payload(), &Options::new(), dispatch(adapter, &request))
            .await
        {
            (CallOutcome::Completed(_), latency) => {
                (true, format!("OK in {} ms", latency.as_millis()))
            }
            (CallOutcome::Failed(error), _) => (false, error.to_string()),
            (CallOutcome::Cancelled, _) => (false, "Cancelled".to_string()),
        }
    }

    /// Models the adapter reports; empty on any failure
    pub async fn get_available_models(&self, adapter: &dyn ProviderAdapter) -> Vec<ModelInfo> {
        let ctx = self.context(adapter, Operation::GetModels, self.options.timeout, None);
        match ctx.run(&Value::Null, &Options::new(), adapter.get_models()).await {
            (CallOutcome::Completed(models), _) => models,
            _ => Vec::new(),
        }
    }

    /// Usage counters the adapter reports; empty on any failure
    pub async fn get_usage_info(&self, adapter: &dyn ProviderAdapter) -> UsageInfo {
        let ctx = self.context(adapter, Operation::GetUsageInfo, self.options.timeout, None);
        match ctx
            .run(&Value::Null, &Options::new(), adapter.get_usage_info())
            .await
        {
            (CallOutcome::Completed(usage), _) => usage,
            _ => UsageInfo::default(),
        }
    }
}

fn failed_result(
    message: String,
    mut provider_status: Map<String, Value>,
    error: &ClassifiedError,
    latency: Duration,
    attempts: u32,
) -> TestResult {
    provider_status.insert("error_level".to_string(), Value::from(error.level.as_str()));
    provider_status.insert("error_code".to_string(), Value::from(error.code.clone()));
    provider_status.insert(
        "retry_recommended".to_string(),
        Value::Bool(error.retry_recommended),
    );
    let mut result = TestResult::new(false, message, latency, attempts);
    result.provider_status = provider_status;
    result
}

fn exceeds_budget(max_total: Option<Duration>, projected: Duration) -> bool {
    max_total.is_some_and(|max| projected >= max)
}

/// Sleep for `delay`; returns false if cancelled first
async fn sleep_unless_cancelled(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
