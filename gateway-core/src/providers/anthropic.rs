//! Anthropic provider adapter
//!
//! Uses the messages API. The system prompt travels in its own field and
//! `max_tokens` is mandatory on every request.

use crate::config::{ConnectionConfig, ProviderConfig};
use crate::debug::RequestLogger;
use crate::http::HttpClient;
use crate::protocol::{
    CategoryScore, ConnectionStatus, Entity, KeywordScore, ModelInfo, Operation, Options,
    QualityScore, UsageInfo,
};
use crate::providers::adapter::{require_text, ProviderAdapter, UsageTracker};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::providers::prompts;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const OPERATIONS: &[Operation] = &Operation::ALL;

/// Anthropic adapter
pub struct AnthropicAdapter {
    id: String,
    config: ProviderConfig,
    http: HttpClient,
    usage: UsageTracker,
}

impl AnthropicAdapter {
    pub fn new(
        config: &ProviderConfig,
        logger: Arc<RequestLogger>,
        connection: &ConnectionConfig,
    ) -> AdapterResult<Self> {
        let mut http = HttpClient::with_config(
            config.id.clone(),
            config.resolved_base_url(),
            logger,
            connection,
        )?
        .with_header("x-api-key", config.api_key.expose_secret())
        .with_header("anthropic-version", ANTHROPIC_VERSION);
        if let Some(timeout) = config.timeout() {
            http = http.with_default_timeout(timeout);
        }

        Ok(Self {
            id: config.id.clone(),
            config: config.clone(),
            http,
            usage: UsageTracker::new(config.cost_per_1k_tokens),
        })
    }

    async fn complete(
        &self,
        operation: Operation,
        prompt: String,
        options: &Options,
    ) -> AdapterResult<String> {
        let model = options
            .model()
            .unwrap_or_else(|| self.config.model_for(operation));

        let payload = json!({
            "model": model,
            "max_tokens": options
                .get_u64(Options::MAX_TOKENS)
                .unwrap_or_else(|| prompts::default_max_tokens(operation)),
            "system": prompts::SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.get_f64("temperature").unwrap_or(0.0),
        });

        let response = self.http.post_json("/v1/messages", &payload, options).await?;

        let input = response.pointer("/usage/input_tokens").and_then(Value::as_u64);
        let output = response.pointer("/usage/output_tokens").and_then(Value::as_u64);
        if input.is_some() || output.is_some() {
            self.usage.record(input.unwrap_or(0) + output.unwrap_or(0));
        }

        // Content is a list of blocks; only text blocks carry the answer
        let text: String = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::decode("Response has no content blocks"))?
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();

        if text.trim().is_empty() {
            return Err(AdapterError::decode("Response contains no text"));
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn declared_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    async fn summarize(&self, text: &str, options: &Options) -> AdapterResult<String> {
        require_text(text)?;
        self.complete(Operation::Summarize, prompts::summarize(text, options), options)
            .await
    }

    async fn extract_entities(&self, text: &str, options: &Options) -> AdapterResult<Vec<Entity>> {
        require_text(text)?;
        let reply = self
            .complete(Operation::ExtractEntities, prompts::extract_entities(text), options)
            .await?;
        prompts::decode_entities(&reply)
    }

    async fn classify(
        &self,
        text: &str,
        categories: &[String],
        options: &Options,
    ) -> AdapterResult<Vec<CategoryScore>> {
        require_text(text)?;
        if categories.is_empty() {
            return Err(AdapterError::invalid_input("At least one category is required"));
        }
        let reply = self
            .complete(Operation::Classify, prompts::classify(text, categories), options)
            .await?;
        prompts::decode_categories(&reply, categories)
    }

    async fn generate_keywords(&self, text: &str, options: &Options) -> AdapterResult<Vec<KeywordScore>> {
        require_text(text)?;
        let reply = self
            .complete(
                Operation::GenerateKeywords,
                prompts::generate_keywords(text, options),
                options,
            )
            .await?;
        prompts::decode_keywords(&reply)
    }

    async fn score_quality(&self, text: &str, options: &Options) -> AdapterResult<QualityScore> {
        require_text(text)?;
        let reply = self
            .complete(Operation::ScoreQuality, prompts::score_quality(text), options)
            .await?;
        prompts::decode_quality(&reply)
    }

    async fn test_connection(&self) -> AdapterResult<ConnectionStatus> {
        match self.http.get_json("/v1/models", &Options::new()).await {
            Ok(response) => {
                let count = response
                    .get("data")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Ok(ConnectionStatus::ok("Connected to Anthropic")
                    .with_status("models_available", count)
                    .with_status("api_version", ANTHROPIC_VERSION))
            }
            Err(e) => Ok(ConnectionStatus::failed(e.to_string())
                .with_status("status_code", e.status_code().unwrap_or(0))),
        }
    }

    async fn get_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let response = self.http.get_json("/v1/models", &Options::new()).await?;
        let data = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::decode("Model list has no data array"))?;

        Ok(data
            .iter()
            .filter_map(|model| {
                let id = model.get("id").and_then(Value::as_str)?;
                let mut info = ModelInfo::new(id);
                info.name = model
                    .get("display_name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                info.owned_by = Some("anthropic".to_string());
                Some(info)
            })
            .collect())
    }

    async fn get_usage_info(&self) -> AdapterResult<UsageInfo> {
        Ok(self.usage.snapshot())
    }
}
