//! Errors raised while loading a gateway configuration

use super::schema::CONFIG_VERSION;
use crate::manager::GatewayError;
use crate::providers::AdapterError;
use std::fmt;
use thiserror::Error;

/// Text format a configuration was supplied in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        })
    }
}

/// Why a configuration could not be turned into a running gateway
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The text is not a well-formed gateway document
    #[error("{format} config does not parse (line {}, column {}): {message}",
            .line.map_or("?".to_string(), |l| l.to_string()),
            .column.map_or("?".to_string(), |c| c.to_string()))]
    Parse {
        format: ConfigFormat,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    /// The document parsed but breaks a gateway rule
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A provider entry is valid but its adapter could not be constructed
    #[error("provider '{provider}' could not be started: {source}")]
    Adapter {
        provider: String,
        #[source]
        source: AdapterError,
    },

    /// The adapters were built but the manager rejected the set
    #[error("service manager could not be assembled: {0}")]
    Assembly(#[source] GatewayError),
}

impl ConfigError {
    pub(crate) fn yaml(err: serde_yaml::Error) -> Self {
        let location = err.location();
        ConfigError::Parse {
            format: ConfigFormat::Yaml,
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            message: err.to_string(),
        }
    }

    pub(crate) fn json(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            format: ConfigFormat::Json,
            line: Some(err.line()),
            column: Some(err.column()),
            message: err.to_string(),
        }
    }

    /// The offending field, for validation failures
    pub fn field_path(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid(e) => Some(&e.field_path),
            _ => None,
        }
    }
}

/// A broken gateway rule, located by field path (`providers[1].base_url`)
#[derive(Debug, Error)]
#[error("invalid config at '{field_path}': {kind}{}", .kind.hint().map(|h| format!(" ({})", h)).unwrap_or_default())]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
}

/// Which gateway rule a configuration breaks
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    Missing,

    #[error("schema version {found:?} is not supported (expected {:?})", CONFIG_VERSION)]
    UnsupportedVersion { found: String },

    #[error("must be greater than zero")]
    NotPositive,

    #[error("must be a non-negative number, got {value}")]
    Negative { value: f64 },

    #[error("provider id '{id}' is used more than once")]
    DuplicateProviderId { id: String },

    #[error("base URL is unusable: {reason}")]
    InvalidBaseUrl { reason: String },

    #[error("'{name}' is not a gateway operation")]
    UnknownOperation { name: String },

    #[error("API key is still the placeholder ${{{placeholder}}}")]
    UnresolvedPlaceholder { placeholder: String },

    #[error("every provider is disabled")]
    NoEnabledProvider,

    #[error("default provider '{id}' is not configured")]
    UnknownDefaultProvider { id: String },

    #[error("default provider '{id}' is disabled")]
    DefaultProviderDisabled { id: String },
}

impl ValidationErrorKind {
    /// What the host can do about it, when that is not obvious
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ValidationErrorKind::UnresolvedPlaceholder { .. } => {
                Some("resolve secrets before handing the config to the gateway")
            }
            ValidationErrorKind::DefaultProviderDisabled { .. } => {
                Some("enable it or pick another default")
            }
            _ => None,
        }
    }
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }

    pub fn missing(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Missing)
    }

    pub fn not_positive(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::NotPositive)
    }

    /// Error on field `field` of the provider entry at `index`
    pub fn provider(index: usize, field: &str, kind: ValidationErrorKind) -> Self {
        Self::new(format!("providers[{}].{}", index, field), kind)
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
