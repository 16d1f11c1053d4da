use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sentinel body stored when an upstream item carries no usable content.
pub const CONTENT_FALLBACK: &str = "Content not available";

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A stored article. `title` is the natural key: the store never holds two
/// records with the same title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub source: String,
    pub category: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

/// A normalized article as produced by a provider, before the store has
/// assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub author: Option<String>,
    pub source: String,
    pub category: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

/// A user's saved feed preferences. At most one record per user; empty
/// lists mean "no restriction on this dimension".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: i64,
    pub preferred_sources: Vec<String>,
    pub preferred_categories: Vec<String>,
}

/// Filter criteria over stored articles. All supplied dimensions must hold:
/// `keyword` is a case-insensitive substring match on the title, `sources`
/// and `categories` are exact set-membership matches.
///
/// `matches` is the authoritative definition; the SQL backend's WHERE
/// clause must agree with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub keyword: Option<String>,
    pub sources: Vec<String>,
    pub categories: Vec<String>,
}

impl ArticleFilter {
    pub fn is_empty(&self) -> bool {
        self.keyword.is_none() && self.sources.is_empty() && self.categories.is_empty()
    }

    pub fn matches(&self, article: &Article) -> bool {
        if let Some(keyword) = &self.keyword {
            let title = article.title.to_ascii_lowercase();
            if !title.contains(&keyword.to_ascii_lowercase()) {
                return false;
            }
        }
        if !self.sources.is_empty() && !self.sources.contains(&article.source) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&article.category) {
            return false;
        }
        true
    }
}

/// A validated, 1-based page request with a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Builds a request from raw query values. A zero page is rejected;
    /// the page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(Error::validation("page", "must be at least 1"));
        }
        let per_page = per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of records before this page starts.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

/// One page of results plus the totals needed to keep paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(request.per_page())) as u32;
        Self {
            items,
            page: request.page(),
            per_page: request.per_page(),
            total,
            total_pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}
