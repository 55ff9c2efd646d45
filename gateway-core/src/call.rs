//! Observed adapter calls
//!
//! Wraps one adapter future with request/response logging, a deadline,
//! optional cancellation and classification of whatever goes wrong. Shared
//! by the service manager and the connection tester.

use crate::classify::{ClassifiedError, ErrorClassifier};
use crate::debug::RequestLogger;
use crate::protocol::{Operation, Options};
use crate::providers::error::{AdapterError, AdapterResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How an observed call ended
#[derive(Debug)]
pub(crate) enum CallOutcome<T> {
    Completed(T),
    Failed(ClassifiedError),
    Cancelled,
}

/// One call's context: who, what and under which limits
pub(crate) struct CallContext<'a> {
    pub logger: &'a RequestLogger,
    pub classifier: &'a ErrorClassifier,
    pub provider: &'a str,
    pub operation: Operation,
    pub timeout: Duration,
    pub cancel: Option<&'a CancellationToken>,
}

impl CallContext<'_> {
    /// Run `call`, logging the request before and the outcome after.
    ///
    /// Dropping the adapter future on timeout or cancellation drops any
    /// in-flight HTTP request with it.
    pub async fn run<T, F>(
        &self,
        payload: &Value,
        options: &Options,
        call: F,
    ) -> (CallOutcome<T>, Duration)
    where
        T: Serialize,
        F: Future<Output = AdapterResult<T>>,
    {
        let request_id = self.logger.log_request(
            self.provider,
            self.operation.as_str(),
            &HashMap::new(),
            payload,
            options,
        );
        let started = Instant::now();

        let result = match self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                r = tokio::time::timeout(self.timeout, call) => Some(r),
            },
            None => Some(tokio::time::timeout(self.timeout, call).await),
        };
        let duration = started.elapsed();

        let result = match result {
            None => {
                debug!(
                    provider = self.provider,
                    operation = %self.operation,
                    %request_id,
                    "call cancelled"
                );
                self.logger.log_response(
                    self.provider,
                    Some(request_id),
                    0,
                    &HashMap::new(),
                    &Value::Null,
                    duration,
                    None,
                );
                return (CallOutcome::Cancelled, duration);
            }
            Some(Ok(result)) => result,
            Some(Err(_elapsed)) => Err(AdapterError::timeout(format!(
                "Call timed out after {} ms",
                self.timeout.as_millis()
            ))),
        };

        match result {
            Ok(value) => {
                let body = serde_json::to_value(&value).unwrap_or(Value::Null);
                self.logger.log_response(
                    self.provider,
                    Some(request_id),
                    200,
                    &HashMap::new(),
                    &body,
                    duration,
                    None,
                );
                (CallOutcome::Completed(value), duration)
            }
            Err(error) => {
                let classified = self.classifier.classify_adapter_error(self.provider, &error);
                warn!(
                    provider = self.provider,
                    operation = %self.operation,
                    %request_id,
                    error_level = %classified.level,
                    code = %classified.code,
                    "call failed"
                );
                self.logger
                    .log_failed_response(Some(request_id), &classified, duration);
                (CallOutcome::Failed(classified), duration)
            }
        }
    }
}
