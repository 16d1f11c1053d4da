use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use na_core::{Error, NewArticle, Result};

pub mod guardian;
pub mod newsapi;
pub mod nyt;

pub use guardian::Guardian;
pub use newsapi::NewsApi;
pub use nyt::Nyt;

/// Static description of one upstream integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Registry name, as accepted by `na fetch --provider`.
    pub name: &'static str,
    /// Human-readable label for the API.
    pub label: &'static str,
    /// Environment variable the API key is read from.
    pub key_env: &'static str,
}

/// Transport errors keep their request URL, and the URL's query string
/// carries the API key. Strip it before the error can reach a log line
/// or a run report.
fn strip_url(err: reqwest::Error) -> Error {
    Error::Fetch(err.without_url())
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;

    /// Full request URL, including the key-in-query-string auth.
    fn endpoint(&self, key: &str) -> String;

    /// Extract the raw article items from the response envelope.
    fn items<'a>(&self, envelope: &'a Value) -> Result<&'a [Value]>;

    /// Map one raw item onto the canonical record.
    fn normalize(&self, item: &Value) -> Result<NewArticle>;

    /// Best-effort title of a raw item, for report lines about articles
    /// that failed to normalize.
    fn title_hint(&self, item: &Value) -> Option<String> {
        item.get("title").and_then(Value::as_str).map(str::to_string)
    }

    /// Fetch and decode the provider's response envelope. Transport
    /// errors are stripped of the key-carrying request URL first.
    async fn fetch(&self, client: &Client, key: &str) -> Result<Value> {
        let response = client
            .get(self.endpoint(key))
            .send()
            .await
            .map_err(strip_url)?
            .error_for_status()
            .map_err(strip_url)?;
        response.json().await.map_err(strip_url)
    }
}

/// Every registered provider, in ingestion order.
pub fn default_providers() -> Vec<Box<dyn Provider>> {
    vec![
        Box::new(NewsApi::new()),
        Box::new(Guardian::new()),
        Box::new(Nyt::new()),
    ]
}

/// Look up a single registered provider by name.
pub fn provider_by_name(name: &str) -> Option<Box<dyn Provider>> {
    default_providers()
        .into_iter()
        .find(|provider| provider.metadata().name == name)
}

/// Field access shared by the normalizers.
pub(crate) mod util {
    use chrono::{DateTime, Utc};
    use serde_json::Value;

    use na_core::{Error, Result};

    /// A string field the provider contract requires on every item.
    pub fn required_str<'a>(item: &'a Value, field: &str) -> Result<&'a str> {
        item.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SchemaMismatch(format!("missing field: {field}")))
    }

    pub fn optional_str(item: &Value, field: &str) -> Option<String> {
        item.get(field).and_then(Value::as_str).map(str::to_string)
    }

    /// Parse an RFC 3339 timestamp, keeping the raw value in the error.
    pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|source| Error::DateParse {
                value: value.to_string(),
                source,
            })
    }
}
