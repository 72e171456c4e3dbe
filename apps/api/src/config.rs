use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::papers::metadata::arxiv::DEFAULT_ARXIV_URL;
use crate::papers::metadata::crossref::DEFAULT_CROSSREF_URL;

/// Where papers, comments, votes and bookmarks live.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local tables; contents vanish on restart.
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub db_max_connections: u32,
    pub crossref_api_url: String,
    pub arxiv_api_url: String,
    pub lookup_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = parse_backend(
            &std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string()),
            std::env::var("DATABASE_URL").ok(),
        )?;

        Ok(Config {
            store_backend,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            crossref_api_url: std::env::var("CROSSREF_API_URL")
                .unwrap_or_else(|_| DEFAULT_CROSSREF_URL.to_string()),
            arxiv_api_url: std::env::var("ARXIV_API_URL")
                .unwrap_or_else(|_| DEFAULT_ARXIV_URL.to_string()),
            lookup_timeout_secs: env_or("LOOKUP_TIMEOUT_SECS", 10)?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_backend(kind: &str, database_url: Option<String>) -> Result<StoreBackend> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "postgres" => {
            let database_url = database_url
                .filter(|u| !u.is_empty())
                .context("Required environment variable 'DATABASE_URL' is not set")?;
            Ok(StoreBackend::Postgres { database_url })
        }
        "memory" => Ok(StoreBackend::Memory),
        other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
