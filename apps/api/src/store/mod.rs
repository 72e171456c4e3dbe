//! Storage seam for every core operation.
//!
//! `PgStore` is the production backend; `MemoryStore` mirrors its constraints
//! in process and backs local runs and the test suite. Both must enforce the
//! uniqueness rules themselves: callers rely on `UniqueViolation` to detect
//! lost creation races.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::bookmark::{Bookmark, BookmarkedPaper};
use crate::models::comment::{Comment, NewComment};
use crate::models::paper::{NewPaper, Paper, PaperQuery};
use crate::models::vote::VoteType;
use crate::votes::ledger::{LedgerError, VoteTransition};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Referenced row missing: {0}")]
    MissingReference(String),

    #[error("Data integrity fault: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference(constraint);
            }
        }
        StoreError::Database(err)
    }
}

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        StoreError::Integrity(err.to_string())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap reachability check for the health probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_paper_by_doi(&self, doi: &str) -> Result<Option<Paper>, StoreError>;

    async fn find_paper_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<Paper>, StoreError>;

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, StoreError>;

    /// Fails with `UniqueViolation` if the doi or arxiv_id is already taken.
    async fn insert_paper(&self, paper: &NewPaper) -> Result<Paper, StoreError>;

    /// Returns one page of papers, newest first, plus the total match count.
    async fn list_papers(&self, query: &PaperQuery) -> Result<(Vec<Paper>, i64), StoreError>;

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, StoreError>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError>;

    /// Every comment on the paper plus all replies hanging off them, unordered.
    async fn thread_comments(&self, paper_id: i64) -> Result<Vec<Comment>, StoreError>;

    /// Records a vote and moves the comment counters in one atomic step.
    /// Concurrent calls on the same comment are serialized.
    async fn cast_vote(
        &self,
        user_id: i64,
        comment_id: i64,
        vote_type: VoteType,
    ) -> Result<(Comment, VoteTransition), StoreError>;

    async fn find_bookmark(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Bookmark>, StoreError>;

    /// Fails with `UniqueViolation` if the pair is already bookmarked.
    async fn insert_bookmark(&self, user_id: i64, paper_id: i64) -> Result<Bookmark, StoreError>;

    /// Returns false if there was nothing to delete.
    async fn delete_bookmark(&self, user_id: i64, paper_id: i64) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkedPaper>, StoreError>;
}
