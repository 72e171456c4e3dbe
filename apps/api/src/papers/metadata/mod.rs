//! External metadata lookups used to enrich newly registered papers.
//!
//! Each identifier scheme has its own [`MetadataSource`]; both normalize into
//! a [`MetadataBundle`]. Transient HTTP failures (429, 5xx, transport errors)
//! are retried here with exponential backoff so the resolver never has to.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

pub mod arxiv;
pub mod crossref;

pub use arxiv::ArxivSource;
pub use crossref::CrossrefSource;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("No record for identifier '{0}'")]
    NotFound(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Normalized paper metadata, regardless of where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBundle {
    pub title: String,
    /// Author names joined by ", ".
    pub authors: String,
    pub abstract_text: String,
    pub published_date: Option<NaiveDate>,
    pub journal: String,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable name for logs ("CrossRef", "arXiv").
    fn name(&self) -> &'static str;

    async fn fetch(&self, identifier: &str) -> Result<MetadataBundle, MetadataError>;
}

/// Issues a GET, retrying transient failures with 500ms, 1s backoff.
/// Returns the first non-transient response, whatever its status.
pub(crate) async fn get_with_retry(
    client: &Client,
    url: &str,
    source: &str,
) -> Result<Response, MetadataError> {
    let mut last_error: Option<MetadataError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
            warn!(
                "{source} lookup attempt {attempt} failed, retrying after {}ms...",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(MetadataError::Http(e));
                continue;
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            last_error = Some(MetadataError::LookupFailed(format!(
                "{source} returned {status}"
            )));
            continue;
        }

        return Ok(response);
    }

    Err(last_error.unwrap_or_else(|| {
        MetadataError::LookupFailed(format!("{source} gave up after {MAX_RETRIES} attempts"))
    }))
}
