use std::fmt;
use std::path::Path;
use std::sync::Arc;

use na_core::{ArticleStore, Error, PreferenceStore, Result};

pub mod backends;

pub use backends::*;

/// The storage handles shared by the API and the ingestor. Both point at
/// the same backend instance.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Build the backend selected by name: `memory`, or `sqlite` when that
/// feature is compiled in. `db_path` only applies to sqlite.
#[cfg_attr(not(feature = "sqlite"), allow(unused_variables))]
pub async fn create_stores(backend: &str, db_path: Option<&Path>) -> Result<Stores> {
    match backend {
        "memory" => {
            let storage = Arc::new(MemoryStorage::new());
            Ok(Stores {
                articles: storage.clone(),
                preferences: storage,
            })
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = db_path.unwrap_or_else(|| Path::new("articles.db"));
            let storage = Arc::new(SqliteStorage::open(path).await?);
            Ok(Stores {
                articles: storage.clone(),
                preferences: storage,
            })
        }
        other => Err(Error::Config(format!("unknown storage backend: {other}"))),
    }
}
