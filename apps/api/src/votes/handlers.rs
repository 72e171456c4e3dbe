use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{require, AppError};
use crate::models::comment::Comment;
use crate::models::vote::VoteType;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: Option<i64>,
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub message: &'static str,
    pub comment: Comment,
}

/// POST /api/v1/comments/:comment_id/vote
pub async fn handle_vote(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    const REQUIRED: &str = "User ID and vote type are required";
    let user_id = require(req.user_id, REQUIRED)?;
    let vote_type: VoteType = require(req.vote_type.as_deref(), REQUIRED)?
        .parse()
        .map_err(|_| AppError::Validation("Vote type must be upvote or downvote".to_string()))?;

    let (comment, transition) = state
        .store
        .cast_vote(user_id, comment_id, vote_type)
        .await?;
    info!(
        "User {user_id} voted {vote_type} on comment {comment_id}: {transition:?} -> {}/{}",
        comment.upvotes, comment.downvotes
    );

    Ok(Json(VoteResponse {
        message: "Vote recorded successfully",
        comment,
    }))
}
