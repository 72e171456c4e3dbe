mod bookmarks;
mod comments;
mod config;
mod db;
mod errors;
mod models;
mod papers;
mod routes;
mod state;
mod store;
mod votes;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::papers::metadata::{ArxivSource, CrossrefSource};
use crate::papers::resolver::MetadataSources;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PaperTalk API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = match &config.store_backend {
        StoreBackend::Postgres { database_url } => {
            let pool = create_pool(database_url, config.db_max_connections).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.lookup_timeout_secs))
        .user_agent(concat!("papertalk-api/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let sources = MetadataSources {
        doi: Arc::new(CrossrefSource::new(http.clone(), &config.crossref_api_url)),
        arxiv: Arc::new(ArxivSource::new(http, &config.arxiv_api_url)),
    };
    info!(
        "Metadata sources: crossref={} arxiv={}",
        config.crossref_api_url, config.arxiv_api_url
    );

    let state = AppState { store, sources };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
