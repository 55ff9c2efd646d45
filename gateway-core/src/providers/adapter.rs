//! Provider adapter trait
//!
//! Every operation a provider could offer is declared on the trait. An
//! adapter overrides the ones it implements and lists them in
//! [`ProviderAdapter::declared_operations`]; the rest keep the default body,
//! which returns [`AdapterError::Unsupported`].

use crate::config::{ConnectionConfig, ProviderConfig, ProviderKind};
use crate::debug::RequestLogger;
use crate::protocol::{
    Capabilities, CategoryScore, ConnectionStatus, Entity, KeywordScore, ModelInfo, Operation,
    OperationOutput, OperationRequest, Options, QualityScore, UsageInfo,
};
use crate::providers::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Uniform operation set implemented once per concrete provider.
///
/// Adapters surface raw failures as [`AdapterError`] and must route every
/// network call through the shared [`RequestLogger`] (the
/// [`HttpClient`](crate::http::HttpClient) does this for them).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider id this adapter was registered under
    fn id(&self) -> &str;

    /// Operations this adapter physically implements
    fn declared_operations(&self) -> &'static [Operation];

    async fn summarize(&self, _text: &str, _options: &Options) -> AdapterResult<String> {
        Err(AdapterError::Unsupported {
            operation: Operation::Summarize,
        })
    }

    async fn extract_entities(&self, _text: &str, _options: &Options) -> AdapterResult<Vec<Entity>> {
        Err(AdapterError::Unsupported {
            operation: Operation::ExtractEntities,
        })
    }

    async fn classify(
        &self,
        _text: &str,
        _categories: &[String],
        _options: &Options,
    ) -> AdapterResult<Vec<CategoryScore>> {
        Err(AdapterError::Unsupported {
            operation: Operation::Classify,
        })
    }

    async fn generate_keywords(
        &self,
        _text: &str,
        _options: &Options,
    ) -> AdapterResult<Vec<KeywordScore>> {
        Err(AdapterError::Unsupported {
            operation: Operation::GenerateKeywords,
        })
    }

    async fn score_quality(&self, _text: &str, _options: &Options) -> AdapterResult<QualityScore> {
        Err(AdapterError::Unsupported {
            operation: Operation::ScoreQuality,
        })
    }

    /// Reachability/auth probe.
    ///
    /// Implementations capture provider failures in the returned
    /// [`ConnectionStatus`]; an `Err` is still tolerated by callers.
    async fn test_connection(&self) -> AdapterResult<ConnectionStatus> {
        Err(AdapterError::Unsupported {
            operation: Operation::TestConnection,
        })
    }

    /// Self-reported capabilities; defaults to the declared operations
    async fn get_capabilities(&self) -> AdapterResult<Capabilities> {
        Ok(Capabilities::new(self.declared_operations().iter().copied()))
    }

    async fn get_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        Err(AdapterError::Unsupported {
            operation: Operation::GetModels,
        })
    }

    /// Best-effort usage counters; empty when the provider has no usage API
    async fn get_usage_info(&self) -> AdapterResult<UsageInfo> {
        Ok(UsageInfo::default())
    }
}

/// Run one request against an adapter and wrap the typed result
pub async fn dispatch(
    adapter: &dyn ProviderAdapter,
    request: &OperationRequest,
) -> AdapterResult<OperationOutput> {
    match request {
        OperationRequest::Summarize { text, options } => adapter
            .summarize(text, options)
            .await
            .map(OperationOutput::Summary),
        OperationRequest::ExtractEntities { text, options } => adapter
            .extract_entities(text, options)
            .await
            .map(OperationOutput::Entities),
        OperationRequest::Classify {
            text,
            categories,
            options,
        } => adapter
            .classify(text, categories, options)
            .await
            .map(OperationOutput::Categories),
        OperationRequest::GenerateKeywords { text, options } => adapter
            .generate_keywords(text, options)
            .await
            .map(OperationOutput::Keywords),
        OperationRequest::ScoreQuality { text, options } => adapter
            .score_quality(text, options)
            .await
            .map(OperationOutput::Quality),
        OperationRequest::TestConnection => adapter
            .test_connection()
            .await
            .map(OperationOutput::Connection),
        OperationRequest::GetCapabilities => adapter
            .get_capabilities()
            .await
            .map(OperationOutput::Capabilities),
        OperationRequest::GetModels => adapter.get_models().await.map(OperationOutput::Models),
        OperationRequest::GetUsageInfo => adapter
            .get_usage_info()
            .await
            .map(OperationOutput::Usage),
    }
}

/// Reject blank input before any network call
pub fn require_text(text: &str) -> AdapterResult<()> {
    if text.trim().is_empty() {
        return Err(AdapterError::invalid_input("Input text must not be empty"));
    }
    Ok(())
}

/// Token and request counters accumulated from provider responses
#[derive(Debug, Default)]
pub struct UsageTracker {
    tokens: AtomicU64,
    requests: AtomicU64,
    /// USD per 1K tokens
    cost_per_1k_tokens: Option<f64>,
}

impl UsageTracker {
    pub fn new(cost_per_1k_tokens: Option<f64>) -> Self {
        Self {
            cost_per_1k_tokens,
            ..Default::default()
        }
    }

    /// Count one completed request and the tokens it reported
    pub fn record(&self, tokens: u64) {
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageInfo {
        let tokens = self.tokens.load(Ordering::Relaxed);
        let mut details = Map::new();
        details.insert("source".to_string(), Value::from("local_accounting"));

        UsageInfo {
            tokens_used: Some(tokens),
            requests: Some(self.requests.load(Ordering::Relaxed)),
            estimated_cost: self
                .cost_per_1k_tokens
                .map(|price| tokens as f64 / 1000.0 * price),
            details,
        }
    }
}

impl ProviderKind {
    /// Build the adapter for this kind from one provider entry
    pub fn create_adapter(
        &self,
        config: &ProviderConfig,
        logger: Arc<RequestLogger>,
        connection: &ConnectionConfig,
    ) -> AdapterResult<Arc<dyn ProviderAdapter>> {
        Ok(match self {
            ProviderKind::OpenAI => Arc::new(crate::providers::OpenAiAdapter::new(
                config, logger, connection,
            )?),
            ProviderKind::Anthropic => Arc::new(crate::providers::AnthropicAdapter::new(
                config, logger, connection,
            )?),
            ProviderKind::HuggingFace => Arc::new(crate::providers::HuggingFaceAdapter::new(
                config, logger, connection,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SummaryOnly;

    #[async_trait]
    impl ProviderAdapter for SummaryOnly {
        fn id(&self) -> &str {
            "summary-only"
        }

        fn declared_operations(&self) -> &'static [Operation] {
            &[Operation::Summarize]
        }

        async fn summarize(&self, text: &str, _options: &Options) -> AdapterResult<String> {
            require_text(text)?;
            Ok(text.split('.').next().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn test_dispatch_implemented_operation() {
        let output = dispatch(&SummaryOnly, &OperationRequest::summarize("First. Second."))
            .await
            .unwrap();
        assert_eq!(output, OperationOutput::Summary("First".to_string()));
    }

    #[tokio::test]
    async fn test_default_bodies_are_unsupported() {
        let err = dispatch(&SummaryOnly, &OperationRequest::generate_keywords("text"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AdapterError::Unsupported {
                operation: Operation::GenerateKeywords
            }
        );
        assert!(SummaryOnly.test_connection().await.is_err());
    }

    #[tokio::test]
    async fn test_default_capabilities_and_usage() {
        let caps = SummaryOnly.get_capabilities().await.unwrap();
        assert!(caps.supports(Operation::Summarize));
        assert!(!caps.supports(Operation::Classify));
        assert!(SummaryOnly.get_usage_info().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_rejected() {
        let err = SummaryOnly.summarize("   ", &Options::new()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_usage_tracker_estimates_cost() {
        let tracker = UsageTracker::new(Some(0.002));
        tracker.record(1500);
        tracker.record(500);
        let usage = tracker.snapshot();
        assert_eq!(usage.tokens_used, Some(2000));
        assert_eq!(usage.requests, Some(2));
        assert!((usage.estimated_cost.unwrap() - 0.004).abs() < 1e-12);

        assert_eq!(UsageTracker::new(None).snapshot().estimated_cost, None);
    }
}
