//! Bookmark set: at most one bookmark per (user, paper).

use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::bookmark::Bookmark;
use crate::store::{Store, StoreError};

pub mod handlers;

#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkOutcome {
    Created(Bookmark),
    Existing(Bookmark),
}

/// Idempotent: an existing bookmark for the pair is returned unchanged.
pub async fn add_bookmark(
    store: &dyn Store,
    user_id: i64,
    paper_id: i64,
) -> Result<BookmarkOutcome, AppError> {
    if let Some(existing) = store.find_bookmark(user_id, paper_id).await? {
        return Ok(BookmarkOutcome::Existing(existing));
    }
    if store.get_paper(paper_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Paper {paper_id} not found")));
    }

    match store.insert_bookmark(user_id, paper_id).await {
        Ok(bookmark) => {
            info!("User {user_id} bookmarked paper {paper_id}");
            Ok(BookmarkOutcome::Created(bookmark))
        }
        Err(StoreError::UniqueViolation(constraint)) => {
            warn!("Concurrent bookmark of paper {paper_id} by user {user_id} hit {constraint}");
            store
                .find_bookmark(user_id, paper_id)
                .await?
                .map(BookmarkOutcome::Existing)
                .ok_or_else(|| AppError::Conflict(format!("Bookmark collided on {constraint}")))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn remove_bookmark(
    store: &dyn Store,
    user_id: i64,
    paper_id: i64,
) -> Result<(), AppError> {
    if !store.delete_bookmark(user_id, paper_id).await? {
        return Err(AppError::NotFound(format!(
            "No bookmark of paper {paper_id} for user {user_id}"
        )));
    }
    info!("User {user_id} removed bookmark of paper {paper_id}");
    Ok(())
}
