use tracing::{info, warn};

use crate::errors::{require, AppError};
use crate::models::comment::{Comment, NewComment};
use crate::store::Store;

/// Adds a comment to a paper, optionally as a reply.
///
/// The parent must exist but may belong to another paper; such replies are
/// accepted and logged.
pub async fn add_comment(
    store: &dyn Store,
    paper_id: i64,
    user_id: Option<i64>,
    content: Option<&str>,
    parent_id: Option<i64>,
) -> Result<Comment, AppError> {
    const REQUIRED: &str = "User ID and content are required";
    let user_id = require(user_id, REQUIRED)?;
    let content = require(content.filter(|c| !c.is_empty()), REQUIRED)?;

    if store.get_paper(paper_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Paper {paper_id} not found")));
    }

    if let Some(parent_id) = parent_id {
        let parent = store
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Parent comment {parent_id} not found")))?;
        if parent.paper_id != paper_id {
            warn!(
                "Comment on paper {paper_id} replies to comment {parent_id} on paper {}",
                parent.paper_id
            );
        }
    }

    let comment = store
        .insert_comment(&NewComment {
            paper_id,
            user_id,
            parent_id,
            content: content.to_string(),
        })
        .await?;

    info!(
        "User {user_id} added comment {} on paper {paper_id}",
        comment.id
    );
    Ok(comment)
}
