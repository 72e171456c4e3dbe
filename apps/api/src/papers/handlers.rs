use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{require, AppError};
use crate::models::paper::Paper;
use crate::papers::listing::{list_papers, PageRequest, PaperPage};
use crate::papers::resolver::{resolve_paper, Resolution};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddPaperRequest {
    pub user_id: Option<i64>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaperResponse {
    pub message: &'static str,
    pub paper: Paper,
}

#[derive(Debug, Deserialize)]
pub struct ListPapersQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

/// POST /api/v1/papers
/// 201 when the paper is new, 200 when it was already registered.
pub async fn handle_add_paper(
    State(state): State<AppState>,
    Json(req): Json<AddPaperRequest>,
) -> Result<(StatusCode, Json<PaperResponse>), AppError> {
    let user_id = require(req.user_id, "User ID is required")?;
    let resolution = resolve_paper(
        state.store.as_ref(),
        &state.sources,
        req.doi.as_deref(),
        req.arxiv_id.as_deref(),
        user_id,
    )
    .await?;

    let (status, message) = match &resolution {
        Resolution::Created(_) => (StatusCode::CREATED, "Paper added successfully"),
        Resolution::Existing(_) => (StatusCode::OK, "Paper already exists"),
    };
    Ok((
        status,
        Json(PaperResponse {
            message,
            paper: resolution.into_paper(),
        }),
    ))
}

/// GET /api/v1/papers
pub async fn handle_list_papers(
    State(state): State<AppState>,
    Query(params): Query<ListPapersQuery>,
) -> Result<Json<PaperPage>, AppError> {
    let page = PageRequest::new(params.page, params.per_page);
    let listing = list_papers(state.store.as_ref(), page, params.search.as_deref()).await?;
    Ok(Json(listing))
}

/// GET /api/v1/papers/:paper_id
pub async fn handle_get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
) -> Result<Json<Paper>, AppError> {
    let paper = state
        .store
        .get_paper(paper_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Paper {paper_id} not found")))?;
    Ok(Json(paper))
}
