use serde_json::Value;

use na_core::{Error, NewArticle, Result, CONTENT_FALLBACK};

use crate::providers::util::{optional_str, parse_timestamp, required_str};
use crate::providers::{Provider, ProviderMetadata};

/// Top-headlines integration. The feed itself is the classification, so
/// every record lands in the constant `general` category.
#[derive(Debug, Clone)]
pub struct NewsApi {
    base_url: String,
}

impl NewsApi {
    const BASE_URL: &'static str = "https://newsapi.org";

    pub fn new() -> Self {
        Self {
            base_url: Self::BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Provider for NewsApi {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "newsapi",
            label: "NewsAPI top headlines",
            key_env: "NEWSAPI_KEY",
        }
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/v2/top-headlines?country=us&apiKey={key}", self.base_url)
    }

    fn items<'a>(&self, envelope: &'a Value) -> Result<&'a [Value]> {
        envelope
            .get("articles")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::SchemaMismatch("missing articles list".into()))
    }

    fn normalize(&self, item: &Value) -> Result<NewArticle> {
        let source = item
            .get("source")
            .and_then(|source| source.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SchemaMismatch("missing field: source.name".into()))?;

        // An empty content string is as good as a missing one.
        let content = optional_str(item, "content")
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| CONTENT_FALLBACK.to_string());

        Ok(NewArticle {
            title: required_str(item, "title")?.to_string(),
            author: optional_str(item, "author"),
            source: source.to_string(),
            category: "general".to_string(),
            content,
            published_at: parse_timestamp(required_str(item, "publishedAt")?)?,
        })
    }
}
