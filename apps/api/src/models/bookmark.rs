use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::paper::Paper;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub paper_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkedPaper {
    #[serde(flatten)]
    pub bookmark: Bookmark,
    pub paper: Paper,
}
