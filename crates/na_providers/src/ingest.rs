use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use na_core::{ArticleStore, Result, UpsertOutcome};

use crate::config::{FetchConfig, ProviderKeys};
use crate::providers::{default_providers, Provider};

/// Outcome of one provider's pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed {
        created: usize,
        updated: usize,
        skipped: Vec<SkippedArticle>,
    },
    Failed {
        error: String,
    },
}

/// An article dropped during normalization, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedArticle {
    pub title: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderRun {
    pub provider: &'static str,
    #[serde(flatten)]
    pub status: RunStatus,
}

/// The batch report an ingestion pass always completes with.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub runs: Vec<ProviderRun>,
}

impl IngestReport {
    pub fn succeeded(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| matches!(run.status, RunStatus::Completed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }
}

/// Runs every configured provider once, in order. Failures are contained
/// at the provider boundary: a failed fetch, a malformed envelope, a
/// missing API key or a storage error marks that provider's run as failed
/// and the pass moves on to the next provider.
pub struct Ingestor {
    store: Arc<dyn ArticleStore>,
    providers: Vec<Box<dyn Provider>>,
    keys: ProviderKeys,
    client: Client,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        keys: ProviderKeys,
        config: &FetchConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            providers: default_providers(),
            keys,
            client: config.build_client()?,
        })
    }

    /// Replace the provider registry, e.g. to ingest a single provider.
    pub fn with_providers(mut self, providers: Vec<Box<dyn Provider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Run one ingestion pass. Never errors: the report records each
    /// provider's outcome, even when every provider failed.
    pub async fn run(&self) -> IngestReport {
        let started_at = Utc::now();
        let mut runs = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.metadata().name;
            info!(provider = name, "starting provider run");
            let status = match self.run_provider(provider.as_ref()).await {
                Ok(status) => status,
                Err(err) => {
                    error!(provider = name, error = %err, "provider run failed");
                    RunStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            runs.push(ProviderRun {
                provider: name,
                status,
            });
        }

        IngestReport {
            started_at,
            finished_at: Utc::now(),
            runs,
        }
    }

    async fn run_provider(&self, provider: &dyn Provider) -> Result<RunStatus> {
        let metadata = provider.metadata();
        let key = self.keys.get(&metadata)?;
        let envelope = provider.fetch(&self.client, key).await?;
        let items = provider.items(&envelope)?;

        let mut created = 0;
        let mut updated = 0;
        let mut skipped = Vec::new();

        for item in items {
            match provider.normalize(item) {
                Ok(article) => match self.store.upsert_article(&article).await? {
                    (_, UpsertOutcome::Created) => created += 1,
                    (_, UpsertOutcome::Updated) => updated += 1,
                },
                Err(err) => {
                    let title = provider.title_hint(item);
                    warn!(
                        provider = metadata.name,
                        title = title.as_deref().unwrap_or("<unknown>"),
                        error = %err,
                        "skipping article"
                    );
                    skipped.push(SkippedArticle {
                        title,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            provider = metadata.name,
            created,
            updated,
            skipped = skipped.len(),
            "provider run completed"
        );
        Ok(RunStatus::Completed {
            created,
            updated,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{util, NewsApi, ProviderMetadata};
    use async_trait::async_trait;
    use na_core::{Article, ArticleFilter, Error, NewArticle, Page, PageRequest};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        articles: Mutex<Vec<Article>>,
    }

    #[async_trait]
    impl ArticleStore for MemStore {
        async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, UpsertOutcome)> {
            let mut articles = self.articles.lock().await;
            if let Some(existing) = articles.iter_mut().find(|a| a.title == article.title) {
                existing.author = article.author.clone();
                existing.source = article.source.clone();
                existing.category = article.category.clone();
                existing.content = article.content.clone();
                existing.published_at = article.published_at;
                return Ok((existing.clone(), UpsertOutcome::Updated));
            }
            let stored = Article {
                id: articles.len() as i64 + 1,
                title: article.title.clone(),
                author: article.author.clone(),
                source: article.source.clone(),
                category: article.category.clone(),
                content: article.content.clone(),
                published_at: article.published_at,
            };
            articles.push(stored.clone());
            Ok((stored, UpsertOutcome::Created))
        }

        async fn get_article(&self, id: i64) -> Result<Option<Article>> {
            let articles = self.articles.lock().await;
            Ok(articles.iter().find(|a| a.id == id).cloned())
        }

        async fn query_articles(
            &self,
            filter: &ArticleFilter,
            page: PageRequest,
        ) -> Result<Page<Article>> {
            let articles = self.articles.lock().await;
            let matched: Vec<Article> =
                articles.iter().filter(|a| filter.matches(a)).cloned().collect();
            let total = matched.len() as u64;
            let items = matched
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.per_page() as usize)
                .collect();
            Ok(Page::new(items, page, total))
        }

        async fn count_articles(&self) -> Result<u64> {
            Ok(self.articles.lock().await.len() as u64)
        }
    }

    struct FakeProvider {
        name: &'static str,
        key_env: &'static str,
        envelope: Result<Value>,
    }

    impl FakeProvider {
        fn ok(name: &'static str, key_env: &'static str, items: Vec<Value>) -> Self {
            Self {
                name,
                key_env,
                envelope: Ok(json!({ "articles": items })),
            }
        }

        fn failing(name: &'static str, key_env: &'static str) -> Self {
            Self {
                name,
                key_env,
                envelope: Err(Error::SchemaMismatch("upstream exploded".into())),
            }
        }

        fn item(title: &str, published_at: &str) -> Value {
            json!({ "title": title, "publishedAt": published_at })
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata {
                name: self.name,
                label: "fake provider",
                key_env: self.key_env,
            }
        }

        fn endpoint(&self, _key: &str) -> String {
            String::new()
        }

        fn items<'a>(&self, envelope: &'a Value) -> Result<&'a [Value]> {
            envelope
                .get("articles")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .ok_or_else(|| Error::SchemaMismatch("missing articles list".into()))
        }

        fn normalize(&self, item: &Value) -> Result<NewArticle> {
            Ok(NewArticle {
                title: util::required_str(item, "title")?.to_string(),
                author: None,
                source: self.name.to_string(),
                category: "general".to_string(),
                content: "body".to_string(),
                published_at: util::parse_timestamp(util::required_str(item, "publishedAt")?)?,
            })
        }

        async fn fetch(&self, _client: &Client, _key: &str) -> Result<Value> {
            match &self.envelope {
                Ok(envelope) => Ok(envelope.clone()),
                Err(err) => Err(Error::SchemaMismatch(err.to_string())),
            }
        }
    }

    fn ingestor(store: Arc<MemStore>, providers: Vec<Box<dyn Provider>>) -> Ingestor {
        let mut keys = ProviderKeys::default();
        for provider in &providers {
            keys.insert(provider.metadata().name, "test-key");
        }
        Ingestor::new(store, keys, &FetchConfig::default())
            .unwrap()
            .with_providers(providers)
    }

    /// One-response HTTP listener for pointing a provider's base URL at.
    async fn spawn_upstream(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&chunk[..n]);
                            if request.windows(4).any(|window| window == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn newsapi_over(base_url: String) -> (Vec<Box<dyn Provider>>, ProviderKeys) {
        let providers: Vec<Box<dyn Provider>> = vec![Box::new(NewsApi::with_base_url(base_url))];
        let mut keys = ProviderKeys::default();
        keys.insert("newsapi", "k-8f3d9a2b");
        (providers, keys)
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_stop_the_rest() {
        let store = Arc::new(MemStore::default());
        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(FakeProvider::ok(
                "alpha",
                "ALPHA_KEY",
                vec![
                    FakeProvider::item("First", "2024-03-01T10:00:00Z"),
                    FakeProvider::item("Second", "2024-03-01T11:00:00Z"),
                ],
            )),
            Box::new(FakeProvider::failing("beta", "BETA_KEY")),
            Box::new(FakeProvider::ok(
                "gamma",
                "GAMMA_KEY",
                vec![FakeProvider::item("Third", "2024-03-01T12:00:00Z")],
            )),
        ];

        let report = ingestor(store.clone(), providers).run().await;

        assert_eq!(report.runs.len(), 3);
        assert!(matches!(
            report.runs[0].status,
            RunStatus::Completed { created: 2, .. }
        ));
        assert!(matches!(report.runs[1].status, RunStatus::Failed { .. }));
        assert!(matches!(
            report.runs[2].status,
            RunStatus::Completed { created: 1, .. }
        ));
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(store.articles.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn a_bad_article_is_skipped_not_fatal() {
        let store = Arc::new(MemStore::default());
        let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider::ok(
            "alpha",
            "ALPHA_KEY",
            vec![
                FakeProvider::item("First", "2024-03-01T10:00:00Z"),
                FakeProvider::item("Bad one", "not a date"),
                FakeProvider::item("Third", "2024-03-01T12:00:00Z"),
            ],
        ))];

        let report = ingestor(store.clone(), providers).run().await;

        match &report.runs[0].status {
            RunStatus::Completed {
                created, skipped, ..
            } => {
                assert_eq!(*created, 2);
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].title.as_deref(), Some("Bad one"));
                assert!(skipped[0].reason.contains("not a date"));
            }
            RunStatus::Failed { error } => panic!("run failed: {error}"),
        }
        assert_eq!(store.articles.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn a_second_pass_updates_instead_of_duplicating() {
        let store = Arc::new(MemStore::default());
        let items = vec![
            FakeProvider::item("First", "2024-03-01T10:00:00Z"),
            FakeProvider::item("Second", "2024-03-01T11:00:00Z"),
        ];
        let make = |items: Vec<Value>| -> Vec<Box<dyn Provider>> {
            vec![Box::new(FakeProvider::ok("alpha", "ALPHA_KEY", items))]
        };

        ingestor(store.clone(), make(items.clone())).run().await;
        let report = ingestor(store.clone(), make(items)).run().await;

        assert!(matches!(
            report.runs[0].status,
            RunStatus::Completed {
                created: 0,
                updated: 2,
                ..
            }
        ));
        assert_eq!(store.articles.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn a_provider_without_a_key_fails_alone() {
        let store = Arc::new(MemStore::default());
        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(FakeProvider::ok(
                "alpha",
                "ALPHA_KEY",
                vec![FakeProvider::item("First", "2024-03-01T10:00:00Z")],
            )),
            Box::new(FakeProvider::ok(
                "beta",
                "BETA_KEY",
                vec![FakeProvider::item("Second", "2024-03-01T11:00:00Z")],
            )),
        ];

        let mut keys = ProviderKeys::default();
        keys.insert("alpha", "test-key");
        let ingestor = Ingestor::new(store.clone(), keys, &FetchConfig::default())
            .unwrap()
            .with_providers(providers);

        let report = ingestor.run().await;

        assert!(matches!(
            report.runs[0].status,
            RunStatus::Completed { created: 1, .. }
        ));
        match &report.runs[1].status {
            RunStatus::Failed { error } => assert!(error.contains("BETA_KEY")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.articles.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn report_json_shape_is_stable() {
        let store = Arc::new(MemStore::default());
        let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider::ok(
            "alpha",
            "ALPHA_KEY",
            vec![FakeProvider::item("First", "2024-03-01T10:00:00Z")],
        ))];

        let report = ingestor(store, providers).run().await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["runs"][0]["provider"], "alpha");
        assert_eq!(json["runs"][0]["status"], "completed");
        assert_eq!(json["runs"][0]["created"], 1);
        assert!(json["started_at"].is_string());
    }

    #[tokio::test]
    async fn a_registry_provider_ingests_over_real_http() {
        let envelope = json!({
            "status": "ok",
            "totalResults": 1,
            "articles": [{
                "source": { "id": "bbc-news", "name": "BBC News" },
                "author": "Jane Price",
                "title": "Rate cut lifts markets",
                "content": "Stocks climbed on Tuesday...",
                "publishedAt": "2024-03-01T15:12:00Z"
            }]
        });
        let base_url = spawn_upstream("200 OK", envelope.to_string()).await;
        let (providers, keys) = newsapi_over(base_url);

        let store = Arc::new(MemStore::default());
        let report = Ingestor::new(store.clone(), keys, &FetchConfig::default())
            .unwrap()
            .with_providers(providers)
            .run()
            .await;

        assert!(matches!(
            report.runs[0].status,
            RunStatus::Completed { created: 1, .. }
        ));
        let articles = store.articles.lock().await;
        assert_eq!(articles[0].title, "Rate cut lifts markets");
        assert_eq!(articles[0].source, "BBC News");
    }

    #[tokio::test]
    async fn an_upstream_error_fails_the_run_without_exposing_the_key() {
        let base_url = spawn_upstream("500 Internal Server Error", "{}".to_string()).await;
        let (providers, keys) = newsapi_over(base_url);

        let store = Arc::new(MemStore::default());
        let report = Ingestor::new(store.clone(), keys, &FetchConfig::default())
            .unwrap()
            .with_providers(providers)
            .run()
            .await;

        match &report.runs[0].status {
            RunStatus::Failed { error } => {
                assert!(error.contains("500"), "unexpected error: {error}");
                assert!(!error.contains("k-8f3d9a2b"), "key leaked: {error}");
                assert!(!error.contains("apiKey"), "request URL leaked: {error}");
            }
            other => panic!("expected a failed run, got {other:?}"),
        }
        assert_eq!(store.articles.lock().await.len(), 0);

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("k-8f3d9a2b"));
    }
}
