use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;

use na_core::{
    Article, ArticleFilter, ArticleStore, Error, NewArticle, Page, PageRequest, PreferenceStore,
    Result, UpsertOutcome, UserPreference,
};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE,
        author TEXT,
        source TEXT NOT NULL,
        category TEXT NOT NULL,
        content TEXT NOT NULL,
        published_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_preferences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        preferred_sources TEXT NOT NULL,
        preferred_categories TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

pub struct SqliteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `db_path` and bring the
    /// schema up to date.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("failed to open {}: {e}", db_path.display())))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            debug!(migration = i, "applying migration");
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("migration {i} failed: {e}")))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn storage_err(err: sqlx::Error) -> Error {
    Error::Storage(err.to_string())
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let published_at: String = row.get("published_at");
    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        source: row.get("source"),
        category: row.get("category"),
        content: row.get("content"),
        published_at: DateTime::parse_from_rfc3339(&published_at)
            .map_err(|e| Error::Storage(format!("bad stored timestamp {published_at}: {e}")))?
            .with_timezone(&Utc),
    })
}

fn row_to_preference(row: &SqliteRow) -> Result<UserPreference> {
    let sources: String = row.get("preferred_sources");
    let categories: String = row.get("preferred_categories");
    Ok(UserPreference {
        user_id: row.get("user_id"),
        preferred_sources: serde_json::from_str(&sources)?,
        preferred_categories: serde_json::from_str(&categories)?,
    })
}

/// WHERE clause and bind values for `filter`, agreeing with
/// `ArticleFilter::matches`: LOWER() folds ASCII exactly like
/// `to_ascii_lowercase`, and LIKE wildcards in the keyword are escaped;
/// the keyword is always a plain substring match.
fn filter_clause(filter: &ArticleFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(keyword) = &filter.keyword {
        conditions.push("LOWER(title) LIKE ? ESCAPE '\\'".to_string());
        let escaped = keyword
            .to_ascii_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        binds.push(format!("%{escaped}%"));
    }
    if !filter.sources.is_empty() {
        let placeholders = vec!["?"; filter.sources.len()].join(", ");
        conditions.push(format!("source IN ({placeholders})"));
        binds.extend(filter.sources.iter().cloned());
    }
    if !filter.categories.is_empty() {
        let placeholders = vec!["?"; filter.categories.len()].join(", ");
        conditions.push(format!("category IN ({placeholders})"));
        binds.extend(filter.categories.iter().cloned());
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, binds)
}

#[async_trait]
impl ArticleStore for SqliteStorage {
    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, UpsertOutcome)> {
        // Decides the Created/Updated label. Two writers racing on the
        // same new title can both read "absent" here and both report
        // Created; the row itself stays unique via the upsert below.
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM articles WHERE title = ?")
            .bind(&article.title)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        // The write itself is a single statement; readers never see a
        // half-updated row.
        let row = sqlx::query(
            r#"
            INSERT INTO articles (title, author, source, category, content, published_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO UPDATE SET
                author = excluded.author,
                source = excluded.source,
                category = excluded.category,
                content = excluded.content,
                published_at = excluded.published_at
            RETURNING id, title, author, source, category, content, published_at
            "#,
        )
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.source)
        .bind(&article.category)
        .bind(&article.content)
        .bind(article.published_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        let outcome = if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        Ok((row_to_article(&row)?, outcome))
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(
            "SELECT id, title, author, source, category, content, published_at \
             FROM articles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn query_articles(
        &self,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<Page<Article>> {
        let (clause, binds) = filter_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM articles{clause}");
        let mut count_query = sqlx::query_scalar(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total: i64 = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let page_sql = format!(
            "SELECT id, title, author, source, category, content, published_at \
             FROM articles{clause} \
             ORDER BY published_at DESC, id ASC LIMIT ? OFFSET ?"
        );
        let mut page_query = sqlx::query(&page_sql);
        for bind in &binds {
            page_query = page_query.bind(bind);
        }
        let rows = page_query
            .bind(i64::from(page.per_page()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let items = rows
            .iter()
            .map(row_to_article)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, page, total as u64))
    }

    async fn count_articles(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(total as u64)
    }
}

#[async_trait]
impl PreferenceStore for SqliteStorage {
    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreference>> {
        let row = sqlx::query(
            "SELECT user_id, preferred_sources, preferred_categories \
             FROM user_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(row_to_preference).transpose()
    }

    async fn set_preferences(&self, preference: &UserPreference) -> Result<UserPreference> {
        let sources = serde_json::to_string(&preference.preferred_sources)?;
        let categories = serde_json::to_string(&preference.preferred_categories)?;
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, preferred_sources, preferred_categories)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                preferred_sources = excluded.preferred_sources,
                preferred_categories = excluded.preferred_categories
            "#,
        )
        .bind(preference.user_id)
        .bind(sources)
        .bind(categories)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(preference.clone())
    }
}
