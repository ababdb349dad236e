//! Credential handling for model providers.
//!
//! Credentials are wrapped in `secrecy::SecretString` the moment they are
//! read, never appear in `Debug`/`Display`, and are only exposed at the point
//! an HTTP header is set.
//!
//! ```ignore
//! let cred = ApiCredential::from_config_or_env(&config, "api_key", "ANTHROPIC_API_KEY", "Anthropic API key")?;
//! request.header("x-api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// An API credential that redacts itself in all formatted output.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Read `config_key` from provider JSON, falling back to `env_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }
        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }
        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    /// Whether a credential could be loaded, without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some() || std::env::var(env_var).is_ok()
    }

    /// The raw value. Call only where the value is sent; never store it.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk-termscope-test-0000";

    #[test]
    fn test_credential_redacted_in_debug_and_display() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Config, "Test API key");

        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains(SECRET));
        assert!(!display.contains(SECRET));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(display, "Test API key from config [REDACTED]");
    }

    #[test]
    fn test_expose_returns_value() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Programmatic, "Test API key");
        assert_eq!(cred.expose(), SECRET);
        assert!(!cred.is_empty());
    }

    #[test]
    fn test_config_takes_precedence_over_env() {
        std::env::set_var("TERMSCOPE_TEST_KEY_PRIORITY", "env-key");
        let cred = ApiCredential::from_config_or_env(
            &serde_json::json!({"api_key": "config-key"}),
            "api_key",
            "TERMSCOPE_TEST_KEY_PRIORITY",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);
        std::env::remove_var("TERMSCOPE_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("TERMSCOPE_TEST_KEY_FALLBACK", "env-key");
        let cred = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "TERMSCOPE_TEST_KEY_FALLBACK",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("TERMSCOPE_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_missing_credential_names_both_sources() {
        let err = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "TERMSCOPE_TEST_KEY_MISSING",
            "Test key",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("api_key"));
        assert!(err.contains("TERMSCOPE_TEST_KEY_MISSING"));
        assert!(!ApiCredential::is_available(&serde_json::json!({}), "api_key", "TERMSCOPE_TEST_KEY_MISSING"));
    }
}
