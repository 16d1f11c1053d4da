use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::Client;

use na_core::{Error, Result};

use crate::providers::{default_providers, ProviderMetadata};

/// HTTP client settings shared by every provider request.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("news-aggregator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn build_client(&self) -> Result<Client> {
        Ok(Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()?)
    }
}

/// API keys by provider registry name.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    keys: HashMap<String, String>,
}

impl ProviderKeys {
    /// Read every registered provider's key from its environment variable.
    /// Unset or empty variables leave that provider unconfigured.
    pub fn from_env() -> Self {
        let mut keys = Self::default();
        for provider in default_providers() {
            let metadata = provider.metadata();
            if let Ok(value) = env::var(metadata.key_env) {
                if !value.is_empty() {
                    keys.insert(metadata.name, value);
                }
            }
        }
        keys
    }

    pub fn insert(&mut self, provider: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(provider.into(), key.into());
    }

    pub fn is_configured(&self, metadata: &ProviderMetadata) -> bool {
        self.keys.contains_key(metadata.name)
    }

    /// The key for `metadata`'s provider, or a `Config` error naming the
    /// variable the operator needs to set.
    pub fn get(&self, metadata: &ProviderMetadata) -> Result<&str> {
        self.keys
            .get(metadata.name)
            .map(String::as_str)
            .ok_or_else(|| Error::Config(format!("{} is not set", metadata.key_env)))
    }
}
