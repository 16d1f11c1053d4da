//! Translation of saved user preferences into article filters.

use crate::types::{ArticleFilter, UserPreference};

/// Build the filter behind a user's personalized feed.
///
/// Each non-empty preference list restricts its dimension; an absent record
/// or empty lists leave the catalog unrestricted. Dimensions combine with
/// AND, membership within a list is OR.
pub fn preference_filter(preference: Option<&UserPreference>) -> ArticleFilter {
    let Some(preference) = preference else {
        return ArticleFilter::default();
    };
    ArticleFilter {
        keyword: None,
        sources: preference.preferred_sources.clone(),
        categories: preference.preferred_categories.clone(),
    }
}
