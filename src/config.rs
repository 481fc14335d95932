use std::env;
use std::sync::Arc;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::provider::{self, ProviderConfig};

pub const PROVIDER_VAR: &str = "DAV_PROVIDER";
pub const USERNAME_VAR: &str = "DAV_USERNAME";
pub const PASSWORD_VAR: &str = "DAV_PASSWORD";

/// Account credentials shared by every client handle.
#[derive(Debug)]
pub struct Credentials {
    pub account_name: String,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(account_name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            secret: SecretString::new(secret.into()),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub credentials: Arc<Credentials>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVariable(key))
        };

        let identifier = required(PROVIDER_VAR)?;
        let account_name = required(USERNAME_VAR)?;
        let secret = required(PASSWORD_VAR)?;

        let provider = provider::resolve(identifier.trim(), &account_name)?;

        Ok(Self {
            provider,
            credentials: Arc::new(Credentials::new(account_name, secret)),
        })
    }
}
