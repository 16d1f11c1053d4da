pub mod config;
pub mod ingest;
pub mod providers;

pub use config::{FetchConfig, ProviderKeys};
pub use ingest::{IngestReport, Ingestor, ProviderRun, RunStatus, SkippedArticle};
pub use providers::{default_providers, provider_by_name, Provider, ProviderMetadata};
