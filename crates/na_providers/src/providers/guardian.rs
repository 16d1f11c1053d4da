use serde_json::Value;

use na_core::{Error, NewArticle, Result, CONTENT_FALLBACK};

use crate::providers::util::{parse_timestamp, required_str};
use crate::providers::{Provider, ProviderMetadata};

/// Topic-search integration. The search API never exposes per-article
/// bylines, so the author is always absent.
#[derive(Debug, Clone)]
pub struct Guardian {
    base_url: String,
    query: String,
}

impl Guardian {
    const BASE_URL: &'static str = "https://content.guardianapis.com";
    const DEFAULT_QUERY: &'static str = "debate";

    pub fn new() -> Self {
        Self::with_base_url(Self::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            query: Self::DEFAULT_QUERY.to_string(),
        }
    }
}

impl Provider for Guardian {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "guardian",
            label: "The Guardian content search",
            key_env: "GUARDIAN_API_KEY",
        }
    }

    fn endpoint(&self, key: &str) -> String {
        // show-fields=body asks the API to attach the article body that
        // normalization reads from fields.body.
        format!(
            "{}/search?q={}&show-fields=body&api-key={key}",
            self.base_url, self.query
        )
    }

    fn items<'a>(&self, envelope: &'a Value) -> Result<&'a [Value]> {
        envelope
            .get("response")
            .and_then(|response| response.get("results"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::SchemaMismatch("missing response.results list".into()))
    }

    fn normalize(&self, item: &Value) -> Result<NewArticle> {
        let content = item
            .get("fields")
            .and_then(|fields| fields.get("body"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| CONTENT_FALLBACK.to_string());

        Ok(NewArticle {
            title: required_str(item, "webTitle")?.to_string(),
            author: None,
            source: "The Guardian".to_string(),
            category: required_str(item, "pillarName")?.to_string(),
            content,
            published_at: parse_timestamp(required_str(item, "webPublicationDate")?)?,
        })
    }

    fn title_hint(&self, item: &Value) -> Option<String> {
        item.get("webTitle").and_then(Value::as_str).map(str::to_string)
    }
}
