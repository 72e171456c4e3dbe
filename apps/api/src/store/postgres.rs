use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::models::bookmark::{Bookmark, BookmarkedPaper};
use crate::models::comment::{Comment, NewComment};
use crate::models::paper::{NewPaper, Paper, PaperQuery};
use crate::models::vote::VoteType;
use crate::store::{Store, StoreError};
use crate::votes::ledger::{Tally, VoteTransition};

/// PostgreSQL-backed store. One transaction (or single statement) per call.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAPER_FILTER: &str = r#"
    ($1::text IS NULL
        OR strpos(title, $1) > 0
        OR strpos(COALESCE(authors, ''), $1) > 0
        OR strpos(COALESCE(abstract, ''), $1) > 0)
"#;

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_paper_by_doi(&self, doi: &str) -> Result<Option<Paper>, StoreError> {
        Ok(
            sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE doi = $1")
                .bind(doi)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_paper_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<Paper>, StoreError> {
        Ok(
            sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE arxiv_id = $1")
                .bind(arxiv_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, StoreError> {
        Ok(
            sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_paper(&self, paper: &NewPaper) -> Result<Paper, StoreError> {
        Ok(sqlx::query_as::<_, Paper>(
            r#"
            INSERT INTO papers
                (doi, arxiv_id, title, authors, abstract, published_date,
                 journal, ai_summary, added_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&paper.doi)
        .bind(&paper.arxiv_id)
        .bind(&paper.title)
        .bind(&paper.authors)
        .bind(&paper.abstract_text)
        .bind(paper.published_date)
        .bind(&paper.journal)
        .bind(&paper.ai_summary)
        .bind(paper.added_by)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_papers(&self, query: &PaperQuery) -> Result<(Vec<Paper>, i64), StoreError> {
        let search = query.search.as_deref();

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM papers WHERE {PAPER_FILTER}"))
                .bind(search)
                .fetch_one(&self.pool)
                .await?;

        let papers = sqlx::query_as::<_, Paper>(&format!(
            "SELECT * FROM papers WHERE {PAPER_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(search)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((papers, total))
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, StoreError> {
        Ok(
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (paper_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(comment.paper_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn thread_comments(&self, paper_id: i64) -> Result<Vec<Comment>, StoreError> {
        // UNION (not UNION ALL) stops the recursion on a malformed parent cycle.
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            WITH RECURSIVE thread AS (
                SELECT * FROM comments WHERE paper_id = $1
                UNION
                SELECT c.* FROM comments c JOIN thread t ON c.parent_id = t.id
            )
            SELECT * FROM thread
            "#,
        )
        .bind(paper_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn cast_vote(
        &self,
        user_id: i64,
        comment_id: i64,
        vote_type: VoteType,
    ) -> Result<(Comment, VoteTransition), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes every voter on this comment until commit.
        let comment: Comment =
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1 FOR UPDATE")
                .bind(comment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("Comment {comment_id}")))?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT vote_type FROM votes WHERE user_id = $1 AND comment_id = $2",
        )
        .bind(user_id)
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let existing = existing
            .map(|raw| raw.parse::<VoteType>())
            .transpose()
            .map_err(|e| StoreError::Integrity(format!("vote ledger row: {e}")))?;

        let transition = VoteTransition::plan(existing, vote_type);
        let tally = Tally::from(&comment).apply(comment_id, transition)?;

        let Some(written) = transition.written_type() else {
            tx.commit().await?;
            return Ok((comment, transition));
        };

        sqlx::query(
            r#"
            INSERT INTO votes (user_id, comment_id, vote_type)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT unique_user_comment_vote
            DO UPDATE SET vote_type = EXCLUDED.vote_type
            "#,
        )
        .bind(user_id)
        .bind(comment_id)
        .bind(written.as_str())
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET upvotes = $2, downvotes = $3 WHERE id = $1 RETURNING *",
        )
        .bind(comment_id)
        .bind(tally.upvotes)
        .bind(tally.downvotes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Vote {transition:?} by user {user_id} on comment {comment_id} committed");
        Ok((updated, transition))
    }

    async fn find_bookmark(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Bookmark>, StoreError> {
        Ok(sqlx::query_as::<_, Bookmark>(
            "SELECT * FROM bookmarks WHERE user_id = $1 AND paper_id = $2",
        )
        .bind(user_id)
        .bind(paper_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_bookmark(&self, user_id: i64, paper_id: i64) -> Result<Bookmark, StoreError> {
        Ok(sqlx::query_as::<_, Bookmark>(
            "INSERT INTO bookmarks (user_id, paper_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(paper_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_bookmark(&self, user_id: i64, paper_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND paper_id = $2")
            .bind(user_id)
            .bind(paper_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkedPaper>, StoreError> {
        let bookmarks = sqlx::query_as::<_, Bookmark>(
            "SELECT * FROM bookmarks WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let paper_ids: Vec<i64> = bookmarks.iter().map(|b| b.paper_id).collect();
        let mut papers: HashMap<i64, Paper> =
            sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = ANY($1)")
                .bind(&paper_ids[..])
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        bookmarks
            .into_iter()
            .map(|bookmark| {
                let paper = papers.remove(&bookmark.paper_id).ok_or_else(|| {
                    StoreError::Integrity(format!(
                        "bookmark {} points at missing paper {}",
                        bookmark.id, bookmark.paper_id
                    ))
                })?;
                Ok(BookmarkedPaper { bookmark, paper })
            })
            .collect()
    }
}
