pub mod error;
pub mod feed;
pub mod storage;
pub mod types;

pub use error::{Error, FieldError, Result, ValidationErrors};
pub use feed::preference_filter;
pub use storage::{ArticleStore, PreferenceStore, UpsertOutcome};
pub use types::{
    Article, ArticleFilter, NewArticle, Page, PageRequest, UserPreference, CONTENT_FALLBACK,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
