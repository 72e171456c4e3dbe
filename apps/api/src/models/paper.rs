use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fixed text stored on every new paper until summaries are generated.
pub const AI_SUMMARY_PLACEHOLDER: &str = "AI summary: currently in development.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Paper {
    pub id: i64,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub title: String,
    /// Author names joined by ", ".
    pub authors: Option<String>,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub journal: Option<String>,
    pub ai_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub added_by: i64,
}

/// Insert payload for a paper. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub published_date: Option<NaiveDate>,
    pub journal: String,
    pub ai_summary: String,
    pub added_by: i64,
}

/// Paging and search parameters for the paper listing.
#[derive(Debug, Clone)]
pub struct PaperQuery {
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Paper {
    /// True if `needle` occurs in the title, authors or abstract (case-sensitive).
    pub fn matches(&self, needle: &str) -> bool {
        self.title.contains(needle)
            || self.authors.as_deref().is_some_and(|a| a.contains(needle))
            || self
                .abstract_text
                .as_deref()
                .is_some_and(|a| a.contains(needle))
    }
}
