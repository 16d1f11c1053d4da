use std::sync::Arc;

use na_core::{ArticleStore, PreferenceStore};

/// Shared handler state. Both handles usually point at the same backend
/// instance.
pub struct AppState {
    pub articles: Arc<dyn ArticleStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}
