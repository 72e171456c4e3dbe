use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::comments::posting::add_comment;
use crate::comments::thread::{list_thread, thread_json};
use crate::errors::AppError;
use crate::models::comment::Comment;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub user_id: Option<i64>,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub message: &'static str,
    pub comment: Comment,
}

/// GET /api/v1/papers/:paper_id/comments
pub async fn handle_get_thread(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
) -> Result<Response, AppError> {
    let thread = list_thread(state.store.as_ref(), paper_id).await?;
    let body = thread_json(&thread).map_err(|e| AppError::Internal(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// POST /api/v1/papers/:paper_id/comments
pub async fn handle_add_comment(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = add_comment(
        state.store.as_ref(),
        paper_id,
        req.user_id,
        req.content.as_deref(),
        req.parent_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment added successfully",
            comment,
        }),
    ))
}
