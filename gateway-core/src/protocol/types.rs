//! Core protocol types for gateway operations
//!
//! This module contains the provider-agnostic data structures exchanged
//! between callers, the [`ServiceManager`](crate::manager::ServiceManager)
//! and the provider adapters. The design prioritizes:
//! - One closed set of operations, named the same way on every provider
//! - Loose per-call options (`Options`) so adapters can accept provider-specific knobs
//! - Serializable results so callers can persist them without conversion

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default per-call timeout when neither the caller nor the config sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An operation a provider adapter may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Produce a summary of the input text
    Summarize,
    /// Extract named entities
    ExtractEntities,
    /// Score the text against caller-supplied categories
    Classify,
    /// Extract weighted keywords
    GenerateKeywords,
    /// Rate the overall quality of the text
    #[serde(rename = "calculate_quality_score")]
    ScoreQuality,
    /// Lightweight reachability/auth probe
    TestConnection,
    /// Self-reported capability set
    GetCapabilities,
    /// List models available to the configured account
    GetModels,
    /// Usage/billing counters
    GetUsageInfo,
}

impl Operation {
    /// All operations, in declaration order
    pub const ALL: [Operation; 9] = [
        Operation::Summarize,
        Operation::ExtractEntities,
        Operation::Classify,
        Operation::GenerateKeywords,
        Operation::ScoreQuality,
        Operation::TestConnection,
        Operation::GetCapabilities,
        Operation::GetModels,
        Operation::GetUsageInfo,
    ];

    /// Content-processing operations, the ones capability reports are about
    pub const CONTENT: [Operation; 5] = [
        Operation::Summarize,
        Operation::ExtractEntities,
        Operation::Classify,
        Operation::GenerateKeywords,
        Operation::ScoreQuality,
    ];

    /// Wire name used in logs, capability sets and config
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Summarize => "summarize",
            Operation::ExtractEntities => "extract_entities",
            Operation::Classify => "classify",
            Operation::GenerateKeywords => "generate_keywords",
            Operation::ScoreQuality => "calculate_quality_score",
            Operation::TestConnection => "test_connection",
            Operation::GetCapabilities => "get_capabilities",
            Operation::GetModels => "get_models",
            Operation::GetUsageInfo => "get_usage_info",
        }
    }

    /// Human label shown in capability reports
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Summarize => "Summarization",
            Operation::ExtractEntities => "Entity Extraction",
            Operation::Classify => "Classification",
            Operation::GenerateKeywords => "Keyword Generation",
            Operation::ScoreQuality => "Quality Scoring",
            Operation::TestConnection => "Connection Test",
            Operation::GetCapabilities => "Capabilities",
            Operation::GetModels => "Model Listing",
            Operation::GetUsageInfo => "Usage Information",
        }
    }

    /// Whether repeating the call has no effect beyond the response itself.
    ///
    /// Content-processing calls are billed and may be recorded by the
    /// provider, so they are not treated as read-only.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Operation::TestConnection
                | Operation::GetCapabilities
                | Operation::GetModels
                | Operation::GetUsageInfo
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown operation: {}", s))
    }
}

/// Loose per-call options (`model`, `max_tokens`, `timeout`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Option key: model override
    pub const MODEL: &'static str = "model";
    /// Option key: maximum output tokens
    pub const MAX_TOKENS: &'static str = "max_tokens";
    /// Option key: per-call timeout in seconds (float)
    pub const TIMEOUT: &'static str = "timeout";
    /// Option key: force request/response tracing for this call
    pub const DEBUG: &'static str = "debug";
    /// Option key: idempotency key forwarded to the provider
    pub const IDEMPOTENCY_KEY: &'static str = "idempotency_key";

    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Model override, if any
    pub fn model(&self) -> Option<&str> {
        self.get_str(Self::MODEL)
    }

    /// Per-call timeout in seconds. Values that are not positive or do
    /// not fit a `Duration` are ignored.
    pub fn timeout(&self) -> Option<Duration> {
        self.get_f64(Self::TIMEOUT)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Whether the caller asked for request/response tracing on this call
    pub fn debug(&self) -> bool {
        self.get_bool(Self::DEBUG).unwrap_or(false)
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.get_str(Self::IDEMPOTENCY_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View as a JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A named entity found in the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl Entity {
    /// Build an entity, clamping confidence into `[0, 1]`
    pub fn new(text: impl Into<String>, entity_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Score of the text against one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// Weighted keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub keyword: String,
    pub score: f64,
}

/// Overall quality score with per-criterion breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: f64,
    #[serde(default)]
    pub breakdown: HashMap<String, f64>,
}

/// Result of an adapter's own connection probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub provider_status: Map<String, Value>,
}

impl ConnectionStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            provider_status: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            provider_status: Map::new(),
        }
    }

    /// Attach one provider-reported status field
    pub fn with_status(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.provider_status.insert(key.into(), value.into());
        self
    }
}

/// Capabilities an adapter reports about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supported_operations: BTreeSet<Operation>,

    /// Provider-specific capability flags
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,
}

impl Capabilities {
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            supported_operations: operations.into_iter().collect(),
            custom: HashMap::new(),
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.supported_operations.contains(&operation)
    }
}

/// A model exposed by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            owned_by: None,
            context_window: None,
        }
    }
}

/// Best-effort usage counters; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl UsageInfo {
    /// True when the provider reported nothing
    pub fn is_empty(&self) -> bool {
        self.tokens_used.is_none()
            && self.requests.is_none()
            && self.estimated_cost.is_none()
            && self.details.is_empty()
    }
}

/// A request routed through [`ServiceManager::invoke`](crate::manager::ServiceManager::invoke)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    Summarize {
        text: String,
        #[serde(default)]
        options: Options,
    },
    ExtractEntities {
        text: String,
        #[serde(default)]
        options: Options,
    },
    Classify {
        text: String,
        categories: Vec<String>,
        #[serde(default)]
        options: Options,
    },
    GenerateKeywords {
        text: String,
        #[serde(default)]
        options: Options,
    },
    #[serde(rename = "calculate_quality_score")]
    ScoreQuality {
        text: String,
        #[serde(default)]
        options: Options,
    },
    TestConnection,
    GetCapabilities,
    GetModels,
    GetUsageInfo,
}

impl OperationRequest {
    pub fn summarize(text: impl Into<String>) -> Self {
        Self::Summarize {
            text: text.into(),
            options: Options::new(),
        }
    }

    pub fn extract_entities(text: impl Into<String>) -> Self {
        Self::ExtractEntities {
            text: text.into(),
            options: Options::new(),
        }
    }

    pub fn classify(text: impl Into<String>, categories: Vec<String>) -> Self {
        Self::Classify {
            text: text.into(),
            categories,
            options: Options::new(),
        }
    }

    pub fn generate_keywords(text: impl Into<String>) -> Self {
        Self::GenerateKeywords {
            text: text.into(),
            options: Options::new(),
        }
    }

    pub fn score_quality(text: impl Into<String>) -> Self {
        Self::ScoreQuality {
            text: text.into(),
            options: Options::new(),
        }
    }

    /// Replace the options of a content operation; no-op for the others
    pub fn with_options(mut self, new_options: Options) -> Self {
        if let Some(options) = self.options_mut() {
            *options = new_options;
        }
        self
    }

    /// The operation this request invokes
    pub fn operation(&self) -> Operation {
        match self {
            Self::Summarize { .. } => Operation::Summarize,
            Self::ExtractEntities { .. } => Operation::ExtractEntities,
            Self::Classify { .. } => Operation::Classify,
            Self::GenerateKeywords { .. } => Operation::GenerateKeywords,
            Self::ScoreQuality { .. } => Operation::ScoreQuality,
            Self::TestConnection => Operation::TestConnection,
            Self::GetCapabilities => Operation::GetCapabilities,
            Self::GetModels => Operation::GetModels,
            Self::GetUsageInfo => Operation::GetUsageInfo,
        }
    }

    pub fn options(&self) -> Option<&Options> {
        match self {
            Self::Summarize { options, .. }
            | Self::ExtractEntities { options, .. }
            | Self::Classify { options, .. }
            | Self::GenerateKeywords { options, .. }
            | Self::ScoreQuality { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn options_mut(&mut self) -> Option<&mut Options> {
        match self {
            Self::Summarize { options, .. }
            | Self::ExtractEntities { options, .. }
            | Self::Classify { options, .. }
            | Self::GenerateKeywords { options, .. }
            | Self::ScoreQuality { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Payload summary recorded by the request logger.
    ///
    /// The input text is kept; options are included as given and are
    /// redacted by the logger before storage.
    pub fn log_payload(&self) -> Value {
        let mut payload = Map::new();
        match self {
            Self::Summarize { text, .. }
            | Self::ExtractEntities { text, .. }
            | Self::GenerateKeywords { text, .. }
            | Self::ScoreQuality { text, .. } => {
                payload.insert("text".to_string(), Value::String(text.clone()));
            }
            Self::Classify {
                text, categories, ..
            } => {
                payload.insert("text".to_string(), Value::String(text.clone()));
                payload.insert(
                    "categories".to_string(),
                    Value::Array(categories.iter().cloned().map(Value::String).collect()),
                );
            }
            _ => {}
        }
        if let Some(options) = self.options().filter(|o| !o.is_empty()) {
            payload.insert("options".to_string(), Value::Object(options.as_map().clone()));
        }
        Value::Object(payload)
    }
}

/// Typed result of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum OperationOutput {
    Summary(String),
    Entities(Vec<Entity>),
    Categories(Vec<CategoryScore>),
    Keywords(Vec<KeywordScore>),
    Quality(QualityScore),
    Connection(ConnectionStatus),
    Capabilities(Capabilities),
    Models(Vec<ModelInfo>),
    Usage(UsageInfo),
}

impl OperationOutput {
    /// JSON rendering of the result, as recorded by the request logger
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("translate".parse::<Operation>().is_err());
    }

    #[test]
    fn test_quality_operation_wire_name() {
        let value = serde_json::to_value(Operation::ScoreQuality).unwrap();
        assert_eq!(value, json!("calculate_quality_score"));
    }

    #[test]
    fn test_read_only_operations() {
        assert!(Operation::GetModels.is_read_only());
        assert!(Operation::TestConnection.is_read_only());
        assert!(!Operation::Summarize.is_read_only());
        assert!(!Operation::Classify.is_read_only());
    }

    #[test]
    fn test_options_accessors() {
        let options = Options::new()
            .with("model", "gpt-4o-mini")
            .with("timeout", 2.5)
            .with("debug", true);

        assert_eq!(options.model(), Some("gpt-4o-mini"));
        assert_eq!(options.timeout(), Some(Duration::from_millis(2500)));
        assert!(options.debug());
        assert_eq!(options.idempotency_key(), None);

        let bad = Options::new().with("timeout", -1.0);
        assert_eq!(bad.timeout(), None);
    }

    #[test]
    fn test_unrepresentable_timeout_ignored() {
        assert_eq!(Options::new().with("timeout", 1e300).timeout(), None);
        assert_eq!(Options::new().with("timeout", f64::MAX).timeout(), None);
        assert_eq!(Options::new().with("timeout", "soon").timeout(), None);
        assert_eq!(
            Options::new().with("timeout", 86_400.0).timeout(),
            Some(Duration::from_secs(86_400))
        );
    }

    #[test]
    fn test_entity_confidence_is_clamped() {
        assert_eq!(Entity::new("Paris", "LOCATION", 1.7).confidence, 1.0);
        assert_eq!(Entity::new("Paris", "LOCATION", -0.2).confidence, 0.0);
        assert_eq!(Entity::new("Paris", "LOCATION", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_request_log_payload_includes_categories() {
        let request = OperationRequest::classify("some text", vec!["news".into(), "sports".into()])
            .with_options(Options::new().with("model", "m"));
        let payload = request.log_payload();

        assert_eq!(payload["text"], json!("some text"));
        assert_eq!(payload["categories"], json!(["news", "sports"]));
        assert_eq!(payload["options"]["model"], json!("m"));
    }

    #[test]
    fn test_with_options_ignored_for_probes() {
        let request = OperationRequest::GetModels.with_options(Options::new().with("model", "m"));
        assert!(request.options().is_none());
        assert_eq!(request.operation(), Operation::GetModels);
    }

    #[test]
    fn test_usage_info_empty() {
        assert!(UsageInfo::default().is_empty());
        let usage = UsageInfo {
            tokens_used: Some(10),
            ..Default::default()
        };
        assert!(!usage.is_empty());
    }
}
