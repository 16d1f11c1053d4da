use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use na_providers::{
    default_providers, provider_by_name, FetchConfig, IngestReport, Ingestor, Provider,
    ProviderKeys, RunStatus,
};
use na_storage::create_stores;
use na_web::AppState;

/// An interval like `30s`, `15m`, `1h30m`, or a bare number of seconds.
#[derive(Debug, Clone, Copy)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut saw_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("invalid duration unit: {c}")),
                }
                current_number.clear();
                saw_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("invalid character in duration: {c}"));
            }
        }

        // A trailing bare number counts as seconds.
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "invalid number in duration".to_string())?;
            total_seconds += num;
            saw_value = true;
        }

        if !saw_value {
            return Err("duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(name = "na", author, version, about = "News aggregation service", long_about = None)]
struct Cli {
    /// Storage backend: sqlite or memory.
    #[arg(long, default_value = "sqlite")]
    storage: String,
    /// Database file for the sqlite backend.
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Run an ingestion pass over the configured providers.
    Fetch {
        /// Fetch a single provider by registry name.
        #[arg(long)]
        provider: Option<String>,
        /// Keep fetching on an interval (e.g. 30m, 1h15m).
        #[arg(long)]
        every: Option<HumanDuration>,
        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the provider registry and API key status.
    Providers,
}

async fn open_stores(storage: &str, db: Option<&Path>) -> anyhow::Result<na_storage::Stores> {
    let stores = create_stores(storage, db)
        .await
        .with_context(|| format!("failed to open {storage} storage"))?;
    info!("💾 Storage ready (using {storage})");
    Ok(stores)
}

async fn serve(storage: &str, db: Option<&Path>, bind: SocketAddr) -> anyhow::Result<()> {
    let stores = open_stores(storage, db).await?;
    let state = AppState {
        articles: stores.articles,
        preferences: stores.preferences,
    };
    na_web::serve(state, bind)
        .await
        .with_context(|| format!("server failed on {bind}"))
}

async fn fetch(
    storage: &str,
    db: Option<&Path>,
    provider: Option<&str>,
    every: Option<HumanDuration>,
    json: bool,
) -> anyhow::Result<()> {
    let stores = open_stores(storage, db).await?;

    let keys = ProviderKeys::from_env();
    let mut ingestor = Ingestor::new(stores.articles, keys, &FetchConfig::default())?;
    if let Some(name) = provider {
        let selected =
            provider_by_name(name).with_context(|| format!("unknown provider: {name}"))?;
        ingestor = ingestor.with_providers(vec![selected]);
    }

    // Provider failures end up in the report, not in the exit status.
    match every {
        Some(HumanDuration(interval)) => loop {
            info!("📡 Starting ingestion pass");
            let report = ingestor.run().await;
            print_report(&report, json)?;
            info!("⏲️ Next pass in {}s", interval.as_secs());
            tokio::time::sleep(interval).await;
        },
        None => {
            let report = ingestor.run().await;
            print_report(&report, json)
        }
    }
}

fn print_report(report: &IngestReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for run in &report.runs {
        match &run.status {
            RunStatus::Completed {
                created,
                updated,
                skipped,
            } => {
                println!(
                    "✅ {}: {created} created, {updated} updated, {} skipped",
                    run.provider,
                    skipped.len()
                );
                for article in skipped {
                    let title = article.title.as_deref().unwrap_or("<untitled>");
                    println!("   ⚠️ skipped {title}: {}", article.reason);
                }
            }
            RunStatus::Failed { error } => {
                println!("❌ {}: {error}", run.provider);
            }
        }
    }
    println!(
        "📰 {} provider(s) succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(())
}

fn list_providers() {
    let keys = ProviderKeys::from_env();
    for provider in default_providers() {
        let metadata = provider.metadata();
        let status = if keys.is_configured(&metadata) {
            "configured"
        } else {
            "missing key"
        };
        println!(
            "{:<10} {} ({}: {})",
            metadata.name, metadata.label, metadata.key_env, status
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => serve(&cli.storage, cli.db.as_deref(), bind).await,
        Commands::Fetch {
            provider,
            every,
            json,
        } => {
            fetch(
                &cli.storage,
                cli.db.as_deref(),
                provider.as_deref(),
                every,
                json,
            )
            .await
        }
        Commands::Providers => {
            list_providers();
            Ok(())
        }
    }
}
