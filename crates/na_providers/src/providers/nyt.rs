use serde_json::Value;

use na_core::{Error, NewArticle, Result, CONTENT_FALLBACK};

use crate::providers::util::{optional_str, parse_timestamp, required_str};
use crate::providers::{Provider, ProviderMetadata};

/// Top-stories integration. The abstract stands in for the article body.
#[derive(Debug, Clone)]
pub struct Nyt {
    base_url: String,
}

impl Nyt {
    const BASE_URL: &'static str = "https://api.nytimes.com";

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

impl Provider for Nyt {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "nyt",
            label: "The New York Times top stories",
            key_env: "NYT_API_KEY",
        }
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/svc/topstories/v2/home.json?api-key={key}", self.base_url)
    }

    fn items<'a>(&self, envelope: &'a Value) -> Result<&'a [Value]> {
        envelope
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::SchemaMismatch("missing results list".into()))
    }

    fn normalize(&self, item: &Value) -> Result<NewArticle> {
        // Byline entries are joined "A, B"; entries without an original
        // form are dropped, and an empty join means no author at all.
        let author = item
            .get("byline")
            .and_then(|byline| byline.get("item"))
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("original").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|joined| !joined.is_empty());

        let content =
            optional_str(item, "abstract").unwrap_or_else(|| CONTENT_FALLBACK.to_string());

        Ok(NewArticle {
            title: required_str(item, "title")?.to_string(),
            author,
            source: "The New York Times".to_string(),
            category: required_str(item, "section")?.to_string(),
            content,
            published_at: parse_timestamp(required_str(item, "published_date")?)?,
        })
    }
}
