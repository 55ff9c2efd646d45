//! Configuration validation utilities

use super::error::{ValidationError, ValidationErrorKind};
use super::schema::GatewayConfig;
use regex::Regex;

/// Configuration validator with cross-field rules on top of
/// [`GatewayConfig::validate`]
pub struct ConfigValidator {
    /// Placeholder syntax hosts commonly use for secrets
    placeholder_pattern: Regex,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            placeholder_pattern: Regex::new(r"^\$\{([A-Za-z_][A-Za-z0-9_]*)\}$")
                .expect("static placeholder pattern"),
        }
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_resolved_secrets(config)?;
        self.validate_enabled_providers(config)?;
        self.validate_default_provider(config)?;

        Ok(())
    }

    /// Keys must arrive resolved; the gateway never expands `${VAR}`
    fn validate_resolved_secrets(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            let key = provider.api_key.expose_secret().trim();
            if let Some(cap) = self.placeholder_pattern.captures(key) {
                return Err(ValidationError::provider(
                    i,
                    "api_key",
                    ValidationErrorKind::UnresolvedPlaceholder {
                        placeholder: cap[1].to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    fn validate_enabled_providers(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        if !config.providers.is_empty() && !config.providers.iter().any(|p| p.enabled) {
            return Err(ValidationError::new(
                "providers",
                ValidationErrorKind::NoEnabledProvider,
            ));
        }
        Ok(())
    }

    fn validate_default_provider(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        let Some(default) = &config.default_provider else {
            return Ok(());
        };

        let kind = match config.providers.iter().find(|p| &p.id == default) {
            Some(p) if p.enabled => return Ok(()),
            Some(_) => ValidationErrorKind::DefaultProviderDisabled { id: default.clone() },
            None => ValidationErrorKind::UnknownDefaultProvider { id: default.clone() },
        };
        Err(ValidationError::new("default_provider", kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, ProviderKind};

    fn config_with(providers: Vec<ProviderConfig>) -> GatewayConfig {
        GatewayConfig {
            providers,
            ..GatewayConfig::new()
        }
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let config = config_with(vec![ProviderConfig::new(
            "openai",
            ProviderKind::OpenAI,
            "${OPENAI_API_KEY}",
        )]);
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "providers[0].api_key");
        assert!(matches!(
            err.kind,
            ValidationErrorKind::UnresolvedPlaceholder { ref placeholder } if placeholder == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn test_all_disabled_rejected() {
        let mut provider = ProviderConfig::new("openai", ProviderKind::OpenAI, "sk-test");
        provider.enabled = false;
        let err = ConfigValidator::new().validate(&config_with(vec![provider])).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NoEnabledProvider);
    }

    #[test]
    fn test_default_provider_must_exist() {
        let mut config = config_with(vec![ProviderConfig::new(
            "openai",
            ProviderKind::OpenAI,
            "sk-test",
        )]);
        config.default_provider = Some("anthropic".to_string());
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "default_provider");
        assert_eq!(
            err.kind,
            ValidationErrorKind::UnknownDefaultProvider { id: "anthropic".to_string() }
        );

        config.default_provider = Some("openai".to_string());
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }
}
