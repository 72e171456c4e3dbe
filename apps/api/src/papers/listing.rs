use serde::Serialize;

use crate::errors::AppError;
use crate::models::paper::{Paper, PaperQuery};
use crate::store::Store;

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Offset paging. Out-of-range input is clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn page_count(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

#[derive(Debug, Serialize)]
pub struct PaperPage {
    pub papers: Vec<Paper>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

pub async fn list_papers(
    store: &dyn Store,
    page: PageRequest,
    search: Option<&str>,
) -> Result<PaperPage, AppError> {
    let search = search.filter(|s| !s.is_empty()).map(String::from);
    let (papers, total) = store
        .list_papers(&PaperQuery {
            search,
            limit: page.per_page,
            offset: page.offset(),
        })
        .await?;

    Ok(PaperPage {
        papers,
        total,
        pages: page.page_count(total),
        current_page: page.page,
    })
}
