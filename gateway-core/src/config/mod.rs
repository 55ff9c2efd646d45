//! Configuration module for the gateway
//!
//! The host application resolves secrets and reads files; this module only
//! parses and validates the text it is handed.

mod error;
mod schema;
mod secrets;
mod validator;

pub use error::{ConfigError, ConfigFormat, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ConnectionConfig, DebugConfig, DefaultConfig, DiagnosticsConfig, GatewayConfig,
    ProviderConfig, ProviderKind, CONFIG_VERSION,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

impl GatewayConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: GatewayConfig = serde_yaml::from_str(content).map_err(ConfigError::yaml)?;

        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: GatewayConfig = serde_json::from_str(content).map_err(ConfigError::json)?;

        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }
}
