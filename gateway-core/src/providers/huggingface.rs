//! HuggingFace inference API adapter
//!
//! Each operation runs a task-specific hosted model: summarization, token
//! classification (NER) and zero-shot classification. There is no keyword,
//! quality or usage endpoint.

use crate::config::{ConnectionConfig, ProviderConfig};
use crate::debug::RequestLogger;
use crate::http::HttpClient;
use crate::protocol::{
    CategoryScore, ConnectionStatus, Entity, ModelInfo, Operation, Options, UsageInfo,
};
use crate::protocol::types::clamp_unit;
use crate::providers::adapter::{require_text, ProviderAdapter};
use crate::providers::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const OPERATIONS: &[Operation] = &[
    Operation::Summarize,
    Operation::ExtractEntities,
    Operation::Classify,
    Operation::TestConnection,
    Operation::GetCapabilities,
    Operation::GetModels,
    Operation::GetUsageInfo,
];

pub const DEFAULT_NER_MODEL: &str = "dslim/bert-base-NER";
pub const DEFAULT_ZERO_SHOT_MODEL: &str = "facebook/bart-large-mnli";

/// HuggingFace adapter
pub struct HuggingFaceAdapter {
    id: String,
    config: ProviderConfig,
    http: HttpClient,
}

#[derive(Deserialize)]
struct NerToken {
    #[serde(alias = "entity")]
    entity_group: String,
    score: f64,
    word: String,
}

#[derive(Deserialize)]
struct ZeroShotResult {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

impl HuggingFaceAdapter {
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
        })
    }

    /// Model for an operation: caller option, per-operation config, then
    /// the task default. The provider-wide `model` only covers summaries.
    fn model_for<'a>(&'a self, operation: Operation, options: &'a Options) -> &'a str {
        if let Some(model) = options.model() {
            return model;
        }
        if let Some(model) = self.config.operation_models.get(operation.as_str()) {
            return model;
        }
        match operation {
            Operation::ExtractEntities => DEFAULT_NER_MODEL,
            Operation::Classify => DEFAULT_ZERO_SHOT_MODEL,
            _ => self.config.resolved_model(),
        }
    }

    async fn run(&self, model: &str, payload: Value, options: &Options) -> AdapterResult<Value> {
        self.http
            .post_json(&format!("/models/{}", model), &payload, options)
            .await
    }
}

#[async_trait]
impl ProviderAdapter for HuggingFaceAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn declared_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    async fn summarize(&self, text: &str, options: &Options) -> AdapterResult<String> {
        require_text(text)?;
        let mut parameters = json!({ "do_sample": false });
        if let Some(max_length) = options.get_u64("max_length") {
            parameters["max_length"] = json!(max_length);
        }

        let response = self
            .run(
                self.model_for(Operation::Summarize, options),
                json!({ "inputs": text, "parameters": parameters }),
                options,
            )
            .await?;

        response
            .pointer("/0/summary_text")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AdapterError::decode("Response has no summary_text"))
    }

    async fn extract_entities(&self, text: &str, options: &Options) -> AdapterResult<Vec<Entity>> {
        require_text(text)?;
        let response = self
            .run(
                self.model_for(Operation::ExtractEntities, options),
                json!({
                    "inputs": text,
                    "parameters": { "aggregation_strategy": "simple" },
                }),
                options,
            )
            .await?;

        let tokens: Vec<NerToken> = serde_json::from_value(response)?;
        Ok(tokens
            .into_iter()
            .map(|t| Entity::new(t.word.trim(), t.entity_group, t.score))
            .collect())
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

        let response = self
            .run(
                self.model_for(Operation::Classify, options),
                json!({
                    "inputs": text,
                    "parameters": {
                        "candidate_labels": categories,
                        "multi_label": options.get_bool("multi_label").unwrap_or(false),
                    },
                }),
                options,
            )
            .await?;

        // Older deployments answer {labels, scores}; newer ones a list of {label, score}
        let scored: Vec<(String, f64)> = if response.is_array() {
            serde_json::from_value::<Vec<LabelScore>>(response)?
                .into_iter()
                .map(|s| (s.label, s.score))
                .collect()
        } else {
            let result: ZeroShotResult = serde_json::from_value(response)?;
            if result.labels.len() != result.scores.len() {
                return Err(AdapterError::decode("labels and scores differ in length"));
            }
            result.labels.into_iter().zip(result.scores).collect()
        };

        Ok(scored
            .into_iter()
            .map(|(category, score)| CategoryScore {
                category,
                score: clamp_unit(score),
            })
            .collect())
    }

    async fn test_connection(&self) -> AdapterResult<ConnectionStatus> {
        let model = self.config.resolved_model();
        match self
            .http
            .get_json(&format!("/status/{}", model), &Options::new())
            .await
        {
            Ok(response) => {
                let mut status = ConnectionStatus::ok("Connected to HuggingFace")
                    .with_status("model", model);
                if let Some(state) = response.get("state").and_then(Value::as_str) {
                    status = status.with_status("state", state);
                }
                if let Some(loaded) = response.get("loaded").and_then(Value::as_bool) {
                    status = status.with_status("loaded", loaded);
                }
                Ok(status)
            }
            Err(e) => Ok(ConnectionStatus::failed(e.to_string())
                .with_status("status_code", e.status_code().unwrap_or(0))),
        }
    }

    /// The inference API has no listing endpoint; report the models this
    /// adapter would use
    async fn get_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        let options = Options::new();
        let mut ids: Vec<&str> = [
            Operation::Summarize,
            Operation::ExtractEntities,
            Operation::Classify,
        ]
        .into_iter()
        .map(|op| self.model_for(op, &options))
        .collect();
        ids.dedup();

        Ok(ids
            .into_iter()
            .map(|id| {
                let mut info = ModelInfo::new(id);
                info.owned_by = id.split('/').next().map(str::to_string);
                info
            })
            .collect())
    }

    async fn get_usage_info(&self) -> AdapterResult<UsageInfo> {
        Ok(UsageInfo::default())
    }
}
