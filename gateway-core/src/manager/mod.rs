//! Service manager
//!
//! The façade callers use: it resolves a provider, checks that the adapter
//! supports the operation, runs the call under the shared
//! [`RequestLogger`] with a deadline and optional cancellation, and turns
//! any failure into a classified, logged [`GatewayError`].
//!
//! The manager never retries business operations. Callers decide, using
//! [`GatewayError::retry_allowed`].

mod error;

pub use error::{GatewayError, GatewayResult, InvocationFailure};

use crate::call::{CallContext, CallOutcome};
use crate::classify::{ErrorClassifier, ErrorLevel};
use crate::config::{ConfigError, ConfigResult, ConfigValidator, GatewayConfig};
use crate::debug::RequestLogger;
use crate::diagnostics::{CapabilityCheck, ConnectionTester, TestOptions, TestResult};
use crate::protocol::{
    CategoryScore, Entity, KeywordScore, ModelInfo, Operation, OperationOutput, OperationRequest,
    Options, QualityScore, UsageInfo, DEFAULT_TIMEOUT,
};
use crate::providers::{dispatch, ProviderAdapter};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default registration priority
pub const DEFAULT_PRIORITY: u32 = 100;

/// Per-call controls for [`ServiceManager::invoke_with`]
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Overrides the request's `timeout` option and the manager default
    pub timeout: Option<Duration>,

    /// Cancels the in-flight call, including its HTTP request
    pub cancel: Option<CancellationToken>,

    /// Sent as `Idempotency-Key`; makes classified failures retry-eligible
    pub idempotency_key: Option<String>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// One registered adapter
struct Registration {
    adapter: Arc<dyn ProviderAdapter>,
    priority: u32,
    /// Capability set resolved on first use
    capabilities: OnceCell<BTreeSet<Operation>>,
}

fn declared_operations(registration: &Registration) -> BTreeSet<Operation> {
    registration
        .adapter
        .declared_operations()
        .iter()
        .copied()
        .collect()
}

/// Façade over the registered provider adapters
pub struct ServiceManager {
    providers: BTreeMap<String, Registration>,
    default_provider: Option<String>,
    logger: Arc<RequestLogger>,
    classifier: ErrorClassifier,
    tester: ConnectionTester,
    default_timeout: Duration,
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("default_provider", &self.default_provider)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Builder for [`ServiceManager`]
pub struct ServiceManagerBuilder {
    providers: BTreeMap<String, Registration>,
    default_provider: Option<String>,
    logger: Option<Arc<RequestLogger>>,
    classifier: ErrorClassifier,
    test_options: TestOptions,
    default_timeout: Duration,
}

impl Default for ServiceManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManagerBuilder {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: None,
            logger: None,
            classifier: ErrorClassifier::new(),
            test_options: TestOptions::default(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Register an adapter under its own id with the default priority
    pub fn register(self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register_with_priority(adapter, DEFAULT_PRIORITY)
    }

    /// Register an adapter; a later registration with the same id replaces
    /// the earlier one
    pub fn register_with_priority(mut self, adapter: Arc<dyn ProviderAdapter>, priority: u32) -> Self {
        self.providers.insert(
            adapter.id().to_string(),
            Registration {
                adapter,
                priority,
                capabilities: OnceCell::new(),
            },
        );
        self
    }

    pub fn default_provider(mut self, id: impl Into<String>) -> Self {
        self.default_provider = Some(id.into());
        self
    }

    /// Shared logger; adapters built separately should hold the same one
    pub fn logger(mut self, logger: Arc<RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn test_options(mut self, options: TestOptions) -> Self {
        self.test_options = options;
        self
    }

    /// Timeout for calls that set none themselves
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Build the manager. Fails if the default provider is not registered.
    pub fn build(self) -> GatewayResult<ServiceManager> {
        if let Some(id) = &self.default_provider {
            if !self.providers.contains_key(id) {
                return Err(GatewayError::UnknownProvider(id.clone()));
            }
        }

        let logger = self.logger.unwrap_or_default();
        let tester = ConnectionTester::new(logger.clone(), self.classifier.clone())
            .with_options(self.test_options);

        Ok(ServiceManager {
            providers: self.providers,
            default_provider: self.default_provider,
            logger,
            classifier: self.classifier,
            tester,
            default_timeout: self.default_timeout,
        })
    }
}

impl ServiceManager {
    pub fn builder() -> ServiceManagerBuilder {
        ServiceManagerBuilder::new()
    }

    /// Build the logger, classifier, tester and one adapter per enabled
    /// provider from a validated configuration
    pub fn from_config(config: &GatewayConfig) -> ConfigResult<Self> {
        ConfigValidator::new().validate(config)?;

        let logger = Arc::new(RequestLogger::with_capacity(
            config.debug.enabled,
            config.debug.log_capacity,
        ));

        let mut builder = ServiceManagerBuilder::new()
            .logger(logger.clone())
            .test_options(TestOptions::from(&config.diagnostics))
            .default_timeout(Duration::from_millis(config.defaults.timeout_ms));

        for provider in config.providers.iter().filter(|p| p.enabled) {
            let adapter = provider
                .kind
                .create_adapter(provider, logger.clone(), &config.connection)
                .map_err(|source| ConfigError::Adapter {
                    provider: provider.id.clone(),
                    source,
                })?;
            builder = builder.register_with_priority(adapter, provider.priority);
        }

        if let Some(id) = &config.default_provider {
            builder = builder.default_provider(id.clone());
        }

        let manager = builder.build().map_err(ConfigError::Assembly)?;
        info!(
            providers = manager.providers.len(),
            default_provider = ?manager.default_provider,
            "service manager ready"
        );
        Ok(manager)
    }

    pub fn logger(&self) -> &Arc<RequestLogger> {
        &self.logger
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn tester(&self) -> &ConnectionTester {
        &self.tester
    }

    /// Registered provider ids, sorted
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn adapter(&self, provider: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.providers.get(provider).map(|r| &r.adapter)
    }

    fn registration(&self, provider: &str) -> GatewayResult<&Registration> {
        self.providers
            .get(provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_string()))
    }

    /// The adapter's capability set: its self-report when available,
    /// otherwise what it declares. A successful lookup is resolved once per
    /// adapter.
    ///
    /// The self-report is bounded by `limit`; past it the declared
    /// operations answer this lookup without being cached. Returns `None`
    /// when `cancel` fires first.
    async fn capabilities(
        &self,
        registration: &Registration,
        limit: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Option<BTreeSet<Operation>> {
        if let Some(known) = registration.capabilities.get() {
            return Some(known.clone());
        }

        let provider = registration.adapter.id();
        let resolve = registration.capabilities.get_or_init(|| async {
            match registration.adapter.get_capabilities().await {
                Ok(capabilities) => capabilities.supported_operations,
                Err(e) => {
                    warn!(
                        provider,
                        error = %e,
                        "capability self-report failed; using declared operations"
                    );
                    declared_operations(registration)
                }
            }
        });
        let lookup = async {
            match tokio::time::timeout(limit, resolve).await {
                Ok(operations) => operations.clone(),
                Err(_) => {
                    warn!(
                        provider,
                        timeout_ms = limit.as_millis() as u64,
                        "capability self-report timed out; using declared operations"
                    );
                    declared_operations(registration)
                }
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                operations = lookup => Some(operations),
            },
            None => Some(lookup.await),
        }
    }

    async fn registration_supports(&self, registration: &Registration, operation: Operation) -> bool {
        operation == Operation::GetCapabilities
            || self
                .capabilities(registration, self.default_timeout, None)
                .await
                .is_some_and(|operations| operations.contains(&operation))
    }

    /// Whether the provider supports `operation`
    pub async fn supports(&self, provider: &str, operation: Operation) -> GatewayResult<bool> {
        let registration = self.registration(provider)?;
        Ok(self.registration_supports(registration, operation).await)
    }

    /// Invoke an operation with default call controls
    pub async fn invoke(
        &self,
        provider: &str,
        request: OperationRequest,
    ) -> GatewayResult<OperationOutput> {
        self.invoke_with(provider, request, &InvokeOptions::default())
            .await
    }

    /// Invoke an operation on one provider.
    ///
    /// Each call ends either succeeded or classified-failed; nothing is
    /// retried here.
    pub async fn invoke_with(
        &self,
        provider: &str,
        mut request: OperationRequest,
        controls: &InvokeOptions,
    ) -> GatewayResult<OperationOutput> {
        let operation = request.operation();
        let registration = self.registration(provider)?;

        if let (Some(key), Some(options)) = (&controls.idempotency_key, request.options_mut()) {
            options.insert(Options::IDEMPOTENCY_KEY, key.clone());
        }
        let idempotency_key = controls.idempotency_key.clone().or_else(|| {
            request
                .options()
                .and_then(|o| o.idempotency_key())
                .map(str::to_string)
        });
        let options = request.options().cloned().unwrap_or_default();
        let timeout = controls
            .timeout
            .or_else(|| options.timeout())
            .unwrap_or(self.default_timeout);
        let cancelled = || GatewayError::Cancelled {
            provider: provider.to_string(),
            operation,
        };

        // The capability lookup and the call share one deadline
        let started = Instant::now();
        if operation != Operation::GetCapabilities {
            let operations = self
                .capabilities(registration, timeout, controls.cancel.as_ref())
                .await
                .ok_or_else(cancelled)?;
            if !operations.contains(&operation) {
                let error = GatewayError::UnsupportedOperation {
                    provider: provider.to_string(),
                    operation,
                };
                self.logger.log_error(provider, &error.to_string(), 405, None);
                return Err(error);
            }
        }
        let adapter = &registration.adapter;
        let remaining = timeout.saturating_sub(started.elapsed());

        debug!(provider, %operation, timeout_ms = remaining.as_millis() as u64, "invoke");

        let ctx = CallContext {
            logger: &self.logger,
            classifier: &self.classifier,
            provider,
            operation,
            timeout: remaining,
            cancel: controls.cancel.as_ref(),
        };
        let (outcome, _) = ctx
            .run(&request.log_payload(), &options, dispatch(adapter.as_ref(), &request))
            .await;

        match outcome {
            CallOutcome::Completed(output) => Ok(output),
            CallOutcome::Failed(error) => Err(InvocationFailure {
                error,
                operation,
                idempotency_key,
            }
            .into()),
            CallOutcome::Cancelled => Err(cancelled()),
        }
    }

    /// The provider `invoke_any` would use for `operation`: the default
    /// provider when it supports the operation, otherwise the supporting
    /// provider with the highest priority (ties broken by id)
    pub async fn select_provider(&self, operation: Operation) -> Option<&str> {
        if let Some(id) = &self.default_provider {
            if let Some(registration) = self.providers.get(id) {
                if self.registration_supports(registration, operation).await {
                    return Some(id.as_str());
                }
            }
        }

        let mut best: Option<(&str, u32)> = None;
        for (id, registration) in &self.providers {
            if !self.registration_supports(registration, operation).await {
                continue;
            }
            if best.is_none_or(|(_, priority)| registration.priority > priority) {
                best = Some((id.as_str(), registration.priority));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Invoke on the selected provider. No failover: a failure is returned
    /// as is, with the provider that produced it.
    pub async fn invoke_any(
        &self,
        request: OperationRequest,
        controls: &InvokeOptions,
    ) -> GatewayResult<(String, OperationOutput)> {
        let operation = request.operation();
        let provider = self
            .select_provider(operation)
            .await
            .ok_or(GatewayError::NoCapableProvider(operation))?
            .to_string();
        let output = self.invoke_with(&provider, request, controls).await?;
        Ok((provider, output))
    }

    /// Connection test against every registered adapter, run concurrently
    pub async fn get_provider_status(&self) -> BTreeMap<String, TestResult> {
        let runs = self.providers.iter().map(|(id, registration)| async move {
            let result = self.tester.run_test(registration.adapter.as_ref()).await;
            (id.clone(), result)
        });
        join_all(runs).await.into_iter().collect()
    }

    /// Capability report for one provider
    pub async fn test_capabilities(
        &self,
        provider: &str,
    ) -> GatewayResult<BTreeMap<Operation, CapabilityCheck>> {
        let registration = self.registration(provider)?;
        Ok(self.tester.test_capabilities(registration.adapter.as_ref()).await)
    }

    pub async fn summarize(&self, provider: &str, text: &str, options: Options) -> GatewayResult<String> {
        let request = OperationRequest::summarize(text).with_options(options);
        match self.invoke(provider, request).await? {
            OperationOutput::Summary(summary) => Ok(summary),
            other => Err(self.unexpected(provider, Operation::Summarize, &other)),
        }
    }

    pub async fn extract_entities(
        &self,
        provider: &str,
        text: &str,
        options: Options,
    ) -> GatewayResult<Vec<Entity>> {
        let request = OperationRequest::extract_entities(text).with_options(options);
        match self.invoke(provider, request).await? {
            OperationOutput::Entities(entities) => Ok(entities),
            other => Err(self.unexpected(provider, Operation::ExtractEntities, &other)),
        }
    }

    pub async fn classify(
        &self,
        provider: &str,
        text: &str,
        categories: Vec<String>,
        options: Options,
    ) -> GatewayResult<Vec<CategoryScore>> {
        let request = OperationRequest::classify(text, categories).with_options(options);
        match self.invoke(provider, request).await? {
            OperationOutput::Categories(scores) => Ok(scores),
            other => Err(self.unexpected(provider, Operation::Classify, &other)),
        }
    }

    pub async fn generate_keywords(
        &self,
        provider: &str,
        text: &str,
        options: Options,
    ) -> GatewayResult<Vec<KeywordScore>> {
        let request = OperationRequest::generate_keywords(text).with_options(options);
        match self.invoke(provider, request).await? {
            OperationOutput::Keywords(keywords) => Ok(keywords),
            other => Err(self.unexpected(provider, Operation::GenerateKeywords, &other)),
        }
    }

    pub async fn score_quality(
        &self,
        provider: &str,
        text: &str,
        options: Options,
    ) -> GatewayResult<QualityScore> {
        let request = OperationRequest::score_quality(text).with_options(options);
        match self.invoke(provider, request).await? {
            OperationOutput::Quality(quality) => Ok(quality),
            other => Err(self.unexpected(provider, Operation::ScoreQuality, &other)),
        }
    }

    pub async fn get_models(&self, provider: &str) -> GatewayResult<Vec<ModelInfo>> {
        match self.invoke(provider, OperationRequest::GetModels).await? {
            OperationOutput::Models(models) => Ok(models),
            other => Err(self.unexpected(provider, Operation::GetModels, &other)),
        }
    }

    pub async fn get_usage_info(&self, provider: &str) -> GatewayResult<UsageInfo> {
        match self.invoke(provider, OperationRequest::GetUsageInfo).await? {
            OperationOutput::Usage(usage) => Ok(usage),
            other => Err(self.unexpected(provider, Operation::GetUsageInfo, &other)),
        }
    }

    /// A result of the wrong shape is a Response-level fault
    fn unexpected(&self, provider: &str, operation: Operation, output: &OperationOutput) -> GatewayError {
        let error = self.classifier.classify_at_level(
            provider,
            ErrorLevel::Response,
            None,
            &format!("Unexpected result for {}: {}", operation, output.to_value()),
        );
        self.logger.log_classified(&error, None);
        InvocationFailure {
            error,
            operation,
            idempotency_key: None,
        }
        .into()
    }
}
