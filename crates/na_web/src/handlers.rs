use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use na_core::{
    preference_filter, Article, ArticleFilter, ArticleStore, Error, Page, PageRequest,
    PreferenceStore, UserPreference, ValidationErrors,
};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListArticlesParams {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// A query parameter counts as supplied only when it is non-empty after
/// trimming; `?keyword=` and `?keyword=%20` are the same as leaving it off.
fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_page_value(raw: Option<&str>, field: &str, errors: &mut ValidationErrors) -> Option<u32> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse::<u32>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(field, "must be a positive integer");
            None
        }
    }
}

fn page_request(page: Option<&str>, per_page: Option<&str>) -> Result<PageRequest, Error> {
    let mut errors = ValidationErrors::new();
    let page = parse_page_value(page, "page", &mut errors);
    let per_page = parse_page_value(per_page, "per_page", &mut errors);
    if !errors.is_empty() {
        return Err(errors.into());
    }
    PageRequest::new(page, per_page)
}

/// Reads an optional array-of-strings field from a JSON body. Missing or
/// null means an empty list; any other shape is a field-level error.
/// Entries are trimmed, blanks dropped, duplicates kept once.
fn string_list(body: &Value, field: &str, errors: &mut ValidationErrors) -> Vec<String> {
    let raw = match body.get(field) {
        None | Some(Value::Null) => return Vec::new(),
        Some(raw) => raw,
    };
    let Some(entries) = raw.as_array() else {
        errors.push(field, "must be an array of strings");
        return Vec::new();
    };
    let mut values: Vec<String> = Vec::new();
    for entry in entries {
        let Some(value) = entry.as_str() else {
            errors.push(field, "must be an array of strings");
            return Vec::new();
        };
        let value = value.trim();
        if !value.is_empty() && !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

fn parse_preferences(user_id: i64, body: &Value) -> Result<UserPreference, Error> {
    let mut errors = ValidationErrors::new();
    let preferred_sources = string_list(body, "preferred_sources", &mut errors);
    let preferred_categories = string_list(body, "preferred_categories", &mut errors);
    if !errors.is_empty() {
        return Err(errors.into());
    }
    Ok(UserPreference {
        user_id,
        preferred_sources,
        preferred_categories,
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let articles = state.articles.count_articles().await?;
    Ok(Json(json!({ "status": "ok", "articles": articles })))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListArticlesParams>,
) -> Result<Json<Page<Article>>, ApiError> {
    let request = page_request(params.page.as_deref(), params.per_page.as_deref())?;
    let filter = ArticleFilter {
        keyword: filled(params.keyword),
        sources: filled(params.source).into_iter().collect(),
        categories: filled(params.category).into_iter().collect(),
    };
    let page = state.articles.query_articles(&filter, request).await?;
    Ok(Json(page))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .articles
        .get_article(id)
        .await?
        .ok_or_else(|| Error::NotFound("Article".into()))?;
    Ok(Json(article))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<UserPreference>, ApiError> {
    let preferences = state
        .preferences
        .get_preferences(user.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Preferences".into()))?;
    Ok(Json(preferences))
}

pub async fn set_preferences(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<Value>,
) -> Result<Json<UserPreference>, ApiError> {
    let preferences = parse_preferences(user.user_id, &body)?;
    let stored = state.preferences.set_preferences(&preferences).await?;
    Ok(Json(stored))
}

/// A caller without a saved preference record gets the full catalog, not
/// a 404; only `GET /api/preferences` treats absence as missing.
pub async fn personalized_feed(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Article>>, ApiError> {
    let request = page_request(params.page.as_deref(), params.per_page.as_deref())?;
    let preferences = state.preferences.get_preferences(user.user_id).await?;
    let filter = preference_filter(preferences.as_ref());
    let page = state.articles.query_articles(&filter, request).await?;
    Ok(Json(page))
}
