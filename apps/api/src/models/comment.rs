use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub paper_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Net score used to rank root comments.
    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub paper_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

/// A comment with its replies, as returned by the thread listing.
///
/// Reply chains can be arbitrarily deep. Dropping is flattened below, and JSON
/// output goes through `comments::thread::thread_json` instead of a derived
/// `Serialize`.
#[derive(Debug, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}
