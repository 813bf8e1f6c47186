use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quaero::api::{AppState, create_router};
use quaero::auth::JwtAuth;
use quaero::config::{CONFIG, StoreBackend};
use quaero::db::{CollectionRepo, Database, SearchRepo};
use quaero::memory_store::MemoryStore;
use quaero::orchestrator::SearchOrchestrator;
use quaero::store::{CollectionStore, SearchStore};
use quaero::summarizer::{GeminiSummarizer, is_placeholder_key};
use quaero::web_search::DuckDuckGoClient;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        /// Overrides BIND_ADDR.
        #[clap(long)]
        bind: Option<String>,

        /// Overrides STORE_BACKEND (mongo or memory).
        #[clap(long)]
        store: Option<StoreBackend>,
    },
    /// Mint a bearer token for local development.
    Token {
        #[clap(long)]
        user: String,

        #[clap(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    match Cli::parse().command {
        Commands::Serve { bind, store } => {
            let bind = bind.unwrap_or_else(|| CONFIG.bind_addr.clone());
            serve(&bind, store.unwrap_or(CONFIG.store_backend)).await
        }
        Commands::Token { user, ttl_hours } => {
            let token = JwtAuth::new(&CONFIG.jwt_secret).issue(&user, Duration::hours(ttl_hours))?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn open_stores(
    backend: StoreBackend,
) -> anyhow::Result<(Arc<dyn SearchStore>, Arc<dyn CollectionStore>)> {
    Ok(match backend {
        StoreBackend::Mongo => {
            let db = Database::init_global().await?;
            (Arc::new(SearchRepo::new(db)), Arc::new(CollectionRepo::new(db)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    })
}

async fn serve(bind: &str, backend: StoreBackend) -> anyhow::Result<()> {
    let mut http = reqwest::Client::builder()
        .user_agent(concat!("quaero/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = CONFIG.outbound_timeout {
        http = http.timeout(timeout);
    }
    let http = http.build().context("Failed to build HTTP client")?;

    if CONFIG
        .gemini_api_key
        .as_deref()
        .is_none_or(is_placeholder_key)
    {
        tracing::warn!("GEMINI_API_KEY missing or placeholder, answers will use the fallback template");
    }

    let (searches, collections) = open_stores(backend).await?;
    let orchestrator = SearchOrchestrator::new(
        Arc::new(DuckDuckGoClient::new(http.clone(), CONFIG.search_api_url.clone())),
        Arc::new(GeminiSummarizer::new(
            http,
            CONFIG.gemini_base_url.clone(),
            CONFIG.gemini_model.clone(),
            CONFIG.gemini_api_key.clone(),
        )),
        searches.clone(),
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        searches,
        collections,
        auth: Arc::new(JwtAuth::new(&CONFIG.jwt_secret)),
    };

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(addr = %bind, store = ?backend, "quaero listening");
    axum::serve(listener, create_router(state))
        .await
        .context("Server error")
}
