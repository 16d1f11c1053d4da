use async_trait::async_trait;
use tokio::sync::RwLock;

use na_core::{
    Article, ArticleFilter, ArticleStore, NewArticle, Page, PageRequest, PreferenceStore, Result,
    UpsertOutcome, UserPreference,
};

struct MemoryInner {
    articles: Vec<Article>,
    preferences: Vec<UserPreference>,
    next_article_id: i64,
}

/// In-memory backend. The storage double in tests; the CLI opts into it
/// with `--storage memory` (sqlite is the default).
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                articles: Vec::new(),
                preferences: Vec::new(),
                next_article_id: 1,
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, UpsertOutcome)> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .articles
            .iter_mut()
            .find(|stored| stored.title == article.title)
        {
            existing.author = article.author.clone();
            existing.source = article.source.clone();
            existing.category = article.category.clone();
            existing.content = article.content.clone();
            existing.published_at = article.published_at;
            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        let id = inner.next_article_id;
        inner.next_article_id += 1;
        let stored = Article {
            id,
            title: article.title.clone(),
            author: article.author.clone(),
            source: article.source.clone(),
            category: article.category.clone(),
            content: article.content.clone(),
            published_at: article.published_at,
        };
        inner.articles.push(stored.clone());
        Ok((stored, UpsertOutcome::Created))
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn query_articles(
        &self,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<Page<Article>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Article> = inner
            .articles
            .iter()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect();
        // Newest first, ids breaking ties. Page boundaries stay stable
        // across requests.
        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page() as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn count_articles(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.articles.len() as u64)
    }
}

#[async_trait]
impl PreferenceStore for MemoryStorage {
    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreference>> {
        let inner = self.inner.read().await;
        Ok(inner
            .preferences
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn set_preferences(&self, preference: &UserPreference) -> Result<UserPreference> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .preferences
            .iter_mut()
            .find(|p| p.user_id == preference.user_id)
        {
            *existing = preference.clone();
        } else {
            inner.preferences.push(preference.clone());
        }
        Ok(preference.clone())
    }
}
