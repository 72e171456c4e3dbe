//! Paper resolver: dedupe by identifier, enrich on miss, create at most once.
//!
//! Lookup goes by DOI when one is given, otherwise by arXiv id. A miss calls
//! the matching metadata source exactly once; a failed lookup creates nothing.
//! The storage unique constraints arbitrate concurrent creations of the same
//! identifier: the loser re-reads and returns the winner's row.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::paper::{NewPaper, Paper, AI_SUMMARY_PLACEHOLDER};
use crate::papers::metadata::MetadataSource;
use crate::store::{Store, StoreError};

/// The two external lookups, keyed by identifier scheme.
#[derive(Clone)]
pub struct MetadataSources {
    pub doi: Arc<dyn MetadataSource>,
    pub arxiv: Arc<dyn MetadataSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Existing(Paper),
    Created(Paper),
}

impl Resolution {
    #[cfg(test)]
    pub fn paper(&self) -> &Paper {
        match self {
            Resolution::Existing(p) | Resolution::Created(p) => p,
        }
    }

    pub fn into_paper(self) -> Paper {
        match self {
            Resolution::Existing(p) | Resolution::Created(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Identifier<'a> {
    Doi(&'a str),
    Arxiv(&'a str),
}

impl fmt::Display for Identifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Doi(doi) => write!(f, "DOI {doi}"),
            Identifier::Arxiv(id) => write!(f, "arXiv {id}"),
        }
    }
}

/// Trims an identifier; blank counts as absent.
fn normalize(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

pub async fn resolve_paper(
    store: &dyn Store,
    sources: &MetadataSources,
    doi: Option<&str>,
    arxiv_id: Option<&str>,
    requested_by: i64,
) -> Result<Resolution, AppError> {
    let doi = normalize(doi);
    let arxiv_id = normalize(arxiv_id);

    let key = match (doi, arxiv_id) {
        (Some(d), _) => Identifier::Doi(d),
        (None, Some(a)) => Identifier::Arxiv(a),
        (None, None) => {
            return Err(AppError::Validation(
                "Either DOI or arXiv ID is required".to_string(),
            ))
        }
    };

    let existing = match key {
        Identifier::Doi(d) => store.find_paper_by_doi(d).await?,
        Identifier::Arxiv(a) => store.find_paper_by_arxiv_id(a).await?,
    };
    if let Some(paper) = existing {
        info!("{key} already registered as paper {}", paper.id);
        return Ok(Resolution::Existing(paper));
    }

    let (source, identifier) = match key {
        Identifier::Doi(d) => (&sources.doi, d),
        Identifier::Arxiv(a) => (&sources.arxiv, a),
    };
    info!("{key} not registered, fetching metadata from {}", source.name());

    let bundle = source.fetch(identifier).await.map_err(|e| {
        warn!("{} lookup for {key} failed: {e}", source.name());
        AppError::EnrichmentFailed(format!("Could not fetch paper information for {key}: {e}"))
    })?;

    let new_paper = NewPaper {
        doi: doi.map(String::from),
        arxiv_id: arxiv_id.map(String::from),
        title: bundle.title,
        authors: bundle.authors,
        abstract_text: bundle.abstract_text,
        published_date: bundle.published_date,
        journal: bundle.journal,
        ai_summary: AI_SUMMARY_PLACEHOLDER.to_string(),
        added_by: requested_by,
    };

    match store.insert_paper(&new_paper).await {
        Ok(paper) => {
            info!("Registered {key} as paper {} for user {requested_by}", paper.id);
            Ok(Resolution::Created(paper))
        }
        Err(StoreError::UniqueViolation(constraint)) => {
            warn!("Concurrent registration of {key} hit {constraint}, re-reading winner");
            reread_winner(store, doi, arxiv_id)
                .await?
                .map(Resolution::Existing)
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "{key} collided on {constraint} but no row was found"
                    ))
                })
        }
        Err(e) => Err(e.into()),
    }
}

async fn reread_winner(
    store: &dyn Store,
    doi: Option<&str>,
    arxiv_id: Option<&str>,
) -> Result<Option<Paper>, StoreError> {
    if let Some(d) = doi {
        if let Some(paper) = store.find_paper_by_doi(d).await? {
            return Ok(Some(paper));
        }
    }
    match arxiv_id {
        Some(a) => store.find_paper_by_arxiv_id(a).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Barrier;

    use crate::models::paper::PaperQuery;
    use crate::papers::metadata::{MetadataBundle, MetadataError};
    use crate::store::MemoryStore;

    struct FakeSource {
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<String>>,
        fail: bool,
        gate: Option<Arc<Barrier>>,
    }

    impl FakeSource {
        fn ok() -> Arc<Self> {
            Arc::new(Self::bare())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::bare()
            })
        }

        fn gated(barrier: Arc<Barrier>) -> Arc<Self> {
            Arc::new(Self {
                gate: Some(barrier),
                ..Self::bare()
            })
        }

        fn bare() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
                fail: false,
                gate: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, identifier: &str) -> Result<MetadataBundle, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(identifier.to_string());
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if self.fail {
                return Err(MetadataError::LookupFailed("connection reset".to_string()));
            }
            Ok(MetadataBundle {
                title: format!("Title of {identifier}"),
                authors: "Ada Lovelace, Charles Babbage".to_string(),
                abstract_text: "An abstract.".to_string(),
                published_date: NaiveDate::from_ymd_opt(2020, 1, 1),
                journal: "Journal of Tests".to_string(),
            })
        }
    }

    fn sources(doi: Arc<FakeSource>, arxiv: Arc<FakeSource>) -> MetadataSources {
        MetadataSources { doi, arxiv }
    }

    async fn total_papers(store: &MemoryStore) -> i64 {
        store
            .list_papers(&PaperQuery {
                search: None,
                limit: 100,
                offset: 0,
            })
            .await
            .unwrap()
            .1
    }

    #[tokio::test]
    async fn test_second_resolve_reuses_first_without_lookup() {
        let store = MemoryStore::new();
        let doi_source = FakeSource::ok();
        let srcs = sources(doi_source.clone(), FakeSource::ok());

        let first = resolve_paper(&store, &srcs, Some("10.1/x"), None, 42).await.unwrap();
        assert!(matches!(first, Resolution::Created(_)));
        assert_eq!(first.paper().added_by, 42);
        assert_eq!(first.paper().ai_summary.as_deref(), Some(AI_SUMMARY_PLACEHOLDER));
        assert_eq!(doi_source.calls(), 1);

        let second = resolve_paper(&store, &srcs, Some("10.1/x"), None, 7).await.unwrap();
        assert_eq!(second, Resolution::Existing(first.paper().clone()));
        assert_eq!(doi_source.calls(), 1);
        assert_eq!(total_papers(&store).await, 1);
    }

    #[tokio::test]
    async fn test_requires_an_identifier() {
        let store = MemoryStore::new();
        let srcs = sources(FakeSource::ok(), FakeSource::ok());
        let err = resolve_paper(&store, &srcs, None, Some("   "), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_doi_wins_when_both_given() {
        let store = MemoryStore::new();
        let doi_source = FakeSource::ok();
        let arxiv_source = FakeSource::ok();
        let srcs = sources(doi_source.clone(), arxiv_source.clone());

        let paper = resolve_paper(&store, &srcs, Some("10.1/y"), Some("1706.03762v2"), 1)
            .await
            .unwrap()
            .into_paper();
        assert_eq!(doi_source.calls(), 1);
        assert_eq!(arxiv_source.calls(), 0);
        assert_eq!(paper.doi.as_deref(), Some("10.1/y"));
        assert_eq!(paper.arxiv_id.as_deref(), Some("1706.03762v2"));
    }

    #[tokio::test]
    async fn test_arxiv_only_uses_arxiv_source() {
        let store = MemoryStore::new();
        let arxiv_source = FakeSource::ok();
        let srcs = sources(FakeSource::ok(), arxiv_source.clone());

        let resolved = resolve_paper(&store, &srcs, None, Some(" 1706.03762 "), 1).await.unwrap();
        assert_eq!(resolved.paper().arxiv_id.as_deref(), Some("1706.03762"));
        assert_eq!(resolved.paper().doi, None);
        assert_eq!(arxiv_source.seen.lock().unwrap().as_slice(), ["1706.03762"]);
    }

    #[tokio::test]
    async fn test_failed_enrichment_creates_nothing() {
        let store = MemoryStore::new();
        let srcs = sources(FakeSource::failing(), FakeSource::ok());
        let err = resolve_paper(&store, &srcs, Some("10.1/broken"), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EnrichmentFailed(_)));
        assert_eq!(total_papers(&store).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_first_resolves_create_one_paper() {
        let store = Arc::new(MemoryStore::new());
        // Both callers pass the dedupe check before either inserts.
        let barrier = Arc::new(Barrier::new(2));
        let srcs = sources(FakeSource::gated(barrier), FakeSource::ok());

        let (a, b) = tokio::join!(
            resolve_paper(store.as_ref(), &srcs, Some("10.1/race"), None, 1),
            resolve_paper(store.as_ref(), &srcs, Some("10.1/race"), None, 2),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.paper().id, b.paper().id);
        let created = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Resolution::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(total_papers(&store).await, 1);
    }

    #[tokio::test]
    async fn test_collision_on_arxiv_id_returns_that_paper() {
        let store = MemoryStore::new();
        let srcs = sources(FakeSource::ok(), FakeSource::ok());

        let by_arxiv = resolve_paper(&store, &srcs, None, Some("2101.00001"), 1)
            .await
            .unwrap()
            .into_paper();
        let both = resolve_paper(&store, &srcs, Some("10.1/new"), Some("2101.00001"), 1)
            .await
            .unwrap();
        assert_eq!(both, Resolution::Existing(by_arxiv));
    }
}
