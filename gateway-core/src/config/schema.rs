//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::debug::DEFAULT_LOG_CAPACITY;
use crate::protocol::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Request/response debugger settings
    #[serde(default)]
    pub debug: DebugConfig,

    /// Connection tester settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Global connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Global defaults
    #[serde(default)]
    pub defaults: DefaultConfig,

    /// Provider preferred by `invoke_any` when it supports the operation
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Configured providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// One provider entry
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider id used in `invoke`
    pub id: String,

    /// Which adapter to build
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// API key, already resolved by the host
    pub api_key: SecretString,

    /// Base URL; defaults per provider kind
    #[serde(default)]
    pub base_url: Option<String>,

    /// Default model; defaults per provider kind
    #[serde(default)]
    pub model: Option<String>,

    /// Per-operation model overrides, keyed by operation name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operation_models: BTreeMap<String, String>,

    /// Per-call timeout override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Whether this provider is registered at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection priority (higher = preferred)
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Price used for usage estimates (USD per 1K tokens)
    #[serde(default)]
    pub cost_per_1k_tokens: Option<f64>,
}

/// Supported provider kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    HuggingFace,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::HuggingFace => "facebook/bart-large-cnn",
        }
    }
}

impl ProviderConfig {
    /// Minimal entry with defaults for everything but id, kind and key
    pub fn new(id: impl Into<String>, kind: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            id: id.into(),
            kind,
            api_key: api_key.into(),
            base_url: None,
            model: None,
            operation_models: BTreeMap::new(),
            timeout_ms: None,
            enabled: true,
            priority: default_priority(),
            cost_per_1k_tokens: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Model for one operation, falling back to the provider default
    pub fn model_for(&self, operation: Operation) -> &str {
        self.operation_models
            .get(operation.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| self.resolved_model())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Request/response debugger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Record request/response traces (errors are always recorded)
    #[serde(default)]
    pub enabled: bool,

    /// Ring buffer capacity
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Connection tester configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry; doubles for each further retry
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound on a whole test run, attempts and delays included
    #[serde(default)]
    pub max_total_ms: Option<u64>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base(),
            max_total_ms: None,
        }
    }
}

/// Connection configuration shared by every adapter's HTTP client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

/// Default configuration values
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultConfig {
    /// Default per-call timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_priority() -> u32 { 100 }
fn default_log_capacity() -> usize { DEFAULT_LOG_CAPACITY }
fn default_timeout() -> u64 { 10_000 }
fn default_retry_attempts() -> u32 { 2 }
fn default_backoff_base() -> u64 { 500 }
fn default_connect_timeout() -> u64 { 5_000 }
fn default_max_idle() -> usize { 10 }

/// Schema version this crate understands
pub const CONFIG_VERSION: &str = "0.1";

impl GatewayConfig {
    /// Empty config at the current version
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            debug: DebugConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            connection: ConnectionConfig::default(),
            defaults: DefaultConfig::default(),
            default_provider: None,
            providers: Vec::new(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::missing("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::UnsupportedVersion {
                    found: self.version.clone(),
                },
            ));
        }

        if self.debug.log_capacity == 0 {
            return Err(ValidationError::not_positive("debug.log_capacity"));
        }

        if self.diagnostics.timeout_ms == 0 {
            return Err(ValidationError::not_positive("diagnostics.timeout_ms"));
        }

        if self.defaults.timeout_ms == 0 {
            return Err(ValidationError::not_positive("defaults.timeout_ms"));
        }

        let mut seen_ids = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_ids.insert(&provider.id) {
                return Err(ValidationError::provider(
                    i,
                    "id",
                    ValidationErrorKind::DuplicateProviderId {
                        id: provider.id.clone(),
                    },
                ));
            }

            provider.validate(i)?;
        }

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderConfig {
    /// Validate the entry found at `providers[index]`
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let invalid = |field: &str, kind| ValidationError::provider(index, field, kind);

        if self.id.is_empty() {
            return Err(invalid("id", ValidationErrorKind::Missing));
        }

        if self.api_key.is_empty() {
            return Err(invalid("api_key", ValidationErrorKind::Missing));
        }

        let reason = match url::Url::parse(self.resolved_base_url()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => None,
            Ok(url) => Some(format!("scheme must be http or https, got {}", url.scheme())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            return Err(invalid("base_url", ValidationErrorKind::InvalidBaseUrl { reason }));
        }

        if let Some(name) = self
            .operation_models
            .keys()
            .find(|key| key.parse::<Operation>().is_err())
        {
            return Err(invalid(
                "operation_models",
                ValidationErrorKind::UnknownOperation { name: name.clone() },
            ));
        }

        if self.timeout_ms == Some(0) {
            return Err(invalid("timeout_ms", ValidationErrorKind::NotPositive));
        }

        if let Some(cost) = self.cost_per_1k_tokens {
            if cost.is_nan() || cost < 0.0 {
                return Err(invalid(
                    "cost_per_1k_tokens",
                    ValidationErrorKind::Negative { value: cost },
                ));
            }
        }

        Ok(())
    }
}
