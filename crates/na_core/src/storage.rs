use async_trait::async_trait;

use crate::types::{Article, ArticleFilter, NewArticle, Page, PageRequest, UserPreference};
use crate::Result;

/// Whether an upsert created a fresh record or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert `article`, or overwrite the record already carrying the same
    /// title. Atomic per record: readers never observe a half-written row.
    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, UpsertOutcome)>;

    /// Fetch a single article by id.
    async fn get_article(&self, id: i64) -> Result<Option<Article>>;

    /// Fetch one page of articles matching `filter`, ordered by
    /// `published_at` descending with `id` ascending as the tiebreak.
    async fn query_articles(
        &self,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<Page<Article>>;

    /// Total number of stored articles.
    async fn count_articles(&self) -> Result<u64>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Fetch the preferences saved for `user_id`.
    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreference>>;

    /// Create or replace the preferences for `preference.user_id`,
    /// returning the stored record.
    async fn set_preferences(&self, preference: &UserPreference) -> Result<UserPreference>;
}
