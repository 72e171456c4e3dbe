use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::bookmarks::{add_bookmark, remove_bookmark, BookmarkOutcome};
use crate::errors::{require, AppError};
use crate::models::bookmark::{Bookmark, BookmarkedPaper};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddBookmarkRequest {
    pub paper_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub message: &'static str,
    pub bookmark: Bookmark,
}

/// GET /api/v1/users/:user_id/bookmarks
pub async fn handle_list_bookmarks(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<BookmarkedPaper>>, AppError> {
    Ok(Json(state.store.list_bookmarks(user_id).await?))
}

/// POST /api/v1/users/:user_id/bookmarks
pub async fn handle_add_bookmark(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<AddBookmarkRequest>,
) -> Result<(StatusCode, Json<BookmarkResponse>), AppError> {
    let paper_id = require(req.paper_id, "Paper ID is required")?;

    Ok(match add_bookmark(state.store.as_ref(), user_id, paper_id).await? {
        BookmarkOutcome::Created(bookmark) => (
            StatusCode::CREATED,
            Json(BookmarkResponse {
                message: "Bookmark added successfully",
                bookmark,
            }),
        ),
        BookmarkOutcome::Existing(bookmark) => (
            StatusCode::OK,
            Json(BookmarkResponse {
                message: "Paper already bookmarked",
                bookmark,
            }),
        ),
    })
}

/// DELETE /api/v1/users/:user_id/bookmarks/:paper_id
pub async fn handle_remove_bookmark(
    State(state): State<AppState>,
    Path((user_id, paper_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    remove_bookmark(state.store.as_ref(), user_id, paper_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
