//! OpenAI provider adapter
//!
//! Content operations go through the chat completions endpoint; the model
//! is prompted for JSON where the result is structured.

use crate::config::{ConnectionConfig, ProviderConfig};
use crate::debug::RequestLogger;
use crate::http::HttpClient;
use crate::protocol::{
    Capabilities, CategoryScore, ConnectionStatus, Entity, KeywordScore, ModelInfo, Operation,
    Options, QualityScore, UsageInfo,
};
use crate::providers::adapter::{require_text, ProviderAdapter, UsageTracker};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::providers::prompts;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const OPERATIONS: &[Operation] = &Operation::ALL;

/// OpenAI adapter
pub struct OpenAiAdapter {
    id: String,
    config: ProviderConfig,
    http: HttpClient,
    usage: UsageTracker,
}

impl OpenAiAdapter {
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
        .with_header(
            "Authorization",
            format!("Bearer {}", config.api_key.expose_secret()),
        );
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

    /// One chat completion; returns the assistant message text
    async fn complete(
        &self,
        operation: Operation,
        prompt: String,
        options: &Options,
    ) -> AdapterResult<String> {
        let model = options
            .model()
            .unwrap_or_else(|| self.config.model_for(operation));
        let max_tokens = options
            .get_u64(Options::MAX_TOKENS)
            .unwrap_or_else(|| prompts::default_max_tokens(operation));

        let payload = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": prompts::SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": max_tokens,
            "temperature": options.get_f64("temperature").unwrap_or(0.0),
        });

        let response = self.http.post_json("/chat/completions", &payload, options).await?;

        if let Some(tokens) = response
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
        {
            self.usage.record(tokens);
        }

        response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AdapterError::decode("Response has no choices[0].message.content"))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
        match self.http.get_json("/models", &Options::new()).await {
            Ok(response) => {
                let count = response
                    .get("data")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Ok(ConnectionStatus::ok("Connected to OpenAI")
                    .with_status("models_available", count)
                    .with_status("model", self.config.resolved_model()))
            }
            Err(e) => Ok(ConnectionStatus::failed(e.to_string())
                .with_status("status_code", e.status_code().unwrap_or(0))),
        }
    }

    async fn get_capabilities(&self) -> AdapterResult<Capabilities> {
        let mut capabilities = Capabilities::new(OPERATIONS.iter().copied());
        capabilities
            .custom
            .insert("json_output".to_string(), Value::Bool(true));
        capabilities
            .custom
            .insert("usage_source".to_string(), Value::from("local_accounting"));
        Ok(capabilities)
    }

    async fn get_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let response = self.http.get_json("/models", &Options::new()).await?;
        let data = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::decode("Model list has no data array"))?;

        Ok(data
            .iter()
            .filter_map(|model| {
                let id = model.get("id").and_then(Value::as_str)?;
                let mut info = ModelInfo::new(id);
                info.owned_by = model
                    .get("owned_by")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(info)
            })
            .collect())
    }

    async fn get_usage_info(&self) -> AdapterResult<UsageInfo> {
        Ok(self.usage.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn test_declares_every_operation() {
        let config = ProviderConfig::new("openai", ProviderKind::OpenAI, "sk-test");
        let adapter = OpenAiAdapter::new(
            &config,
            Arc::new(RequestLogger::default()),
            &ConnectionConfig::default(),
        )
        .unwrap();
        assert_eq!(adapter.id(), "openai");
        assert_eq!(adapter.declared_operations().len(), Operation::ALL.len());
    }
}
