use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::models::bookmark::{Bookmark, BookmarkedPaper};
use crate::models::comment::{Comment, NewComment};
use crate::models::paper::{NewPaper, Paper, PaperQuery};
use crate::models::vote::{Vote, VoteType};
use crate::store::{Store, StoreError};
use crate::votes::ledger::{Tally, VoteTransition};

#[derive(Default)]
struct Tables {
    next_id: i64,
    papers: BTreeMap<i64, Paper>,
    comments: BTreeMap<i64, Comment>,
    votes: HashMap<(i64, i64), Vote>,
    bookmarks: BTreeMap<i64, Bookmark>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store with the same uniqueness and reference rules as the
/// Postgres schema (users are not tracked). A single lock makes every call
/// one atomic step.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-type vote counts straight from the ledger, for consistency checks.
    #[cfg(test)]
    pub async fn ledger_counts(&self, comment_id: i64) -> (i32, i32) {
        let tables = self.tables.lock().await;
        tables
            .votes
            .values()
            .filter(|v| v.comment_id == comment_id)
            .fold((0, 0), |(up, down), v| match v.vote_type {
                VoteType::Upvote => (up + 1, down),
                VoteType::Downvote => (up, down + 1),
            })
    }

    #[cfg(test)]
    pub async fn paper_count(&self) -> usize {
        self.tables.lock().await.papers.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_paper_by_doi(&self, doi: &str) -> Result<Option<Paper>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .papers
            .values()
            .find(|p| p.doi.as_deref() == Some(doi))
            .cloned())
    }

    async fn find_paper_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<Paper>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .papers
            .values()
            .find(|p| p.arxiv_id.as_deref() == Some(arxiv_id))
            .cloned())
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, StoreError> {
        Ok(self.tables.lock().await.papers.get(&id).cloned())
    }

    async fn insert_paper(&self, paper: &NewPaper) -> Result<Paper, StoreError> {
        let mut tables = self.tables.lock().await;
        for existing in tables.papers.values() {
            if paper.doi.is_some() && existing.doi == paper.doi {
                return Err(StoreError::UniqueViolation("papers_doi_key".to_string()));
            }
            if paper.arxiv_id.is_some() && existing.arxiv_id == paper.arxiv_id {
                return Err(StoreError::UniqueViolation("papers_arxiv_id_key".to_string()));
            }
        }
        let id = tables.next_id();
        let row = Paper {
            id,
            doi: paper.doi.clone(),
            arxiv_id: paper.arxiv_id.clone(),
            title: paper.title.clone(),
            authors: Some(paper.authors.clone()),
            abstract_text: Some(paper.abstract_text.clone()),
            published_date: paper.published_date,
            journal: Some(paper.journal.clone()),
            ai_summary: Some(paper.ai_summary.clone()),
            created_at: Utc::now(),
            added_by: paper.added_by,
        };
        tables.papers.insert(id, row.clone());
        Ok(row)
    }

    async fn list_papers(&self, query: &PaperQuery) -> Result<(Vec<Paper>, i64), StoreError> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<&Paper> = tables
            .papers
            .values()
            .filter(|p| query.search.as_deref().map_or(true, |s| p.matches(s)))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, StoreError> {
        Ok(self.tables.lock().await.comments.get(&id).cloned())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.papers.contains_key(&comment.paper_id) {
            return Err(StoreError::MissingReference(
                "comments_paper_id_fkey".to_string(),
            ));
        }
        if let Some(parent) = comment.parent_id {
            if !tables.comments.contains_key(&parent) {
                return Err(StoreError::MissingReference(
                    "comments_parent_id_fkey".to_string(),
                ));
            }
        }
        let id = tables.next_id();
        let row = Comment {
            id,
            paper_id: comment.paper_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content.clone(),
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now(),
        };
        tables.comments.insert(id, row.clone());
        Ok(row)
    }

    async fn thread_comments(&self, paper_id: i64) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut included: HashSet<i64> = tables
            .comments
            .values()
            .filter(|c| c.paper_id == paper_id)
            .map(|c| c.id)
            .collect();

        // Pull in replies recorded on other papers until nothing new appears.
        loop {
            let added: Vec<i64> = tables
                .comments
                .values()
                .filter(|c| !included.contains(&c.id))
                .filter(|c| c.parent_id.is_some_and(|p| included.contains(&p)))
                .map(|c| c.id)
                .collect();
            if added.is_empty() {
                break;
            }
            included.extend(added);
        }

        Ok(tables
            .comments
            .values()
            .filter(|c| included.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn cast_vote(
        &self,
        user_id: i64,
        comment_id: i64,
        vote_type: VoteType,
    ) -> Result<(Comment, VoteTransition), StoreError> {
        let mut tables = self.tables.lock().await;
        let Tables {
            next_id,
            comments,
            votes,
            ..
        } = &mut *tables;

        let comment = comments
            .get_mut(&comment_id)
            .ok_or_else(|| StoreError::NotFound(format!("Comment {comment_id}")))?;

        let key = (user_id, comment_id);
        let existing = votes.get(&key).map(|v| v.vote_type);
        let transition = VoteTransition::plan(existing, vote_type);
        let tally = Tally::from(&*comment).apply(comment_id, transition)?;

        match transition {
            VoteTransition::Unchanged => {}
            VoteTransition::Create(t) => {
                *next_id += 1;
                votes.insert(
                    key,
                    Vote {
                        id: *next_id,
                        user_id,
                        comment_id,
                        vote_type: t,
                        created_at: Utc::now(),
                    },
                );
            }
            VoteTransition::Flip { to, .. } => {
                if let Some(vote) = votes.get_mut(&key) {
                    vote.vote_type = to;
                }
            }
        }

        comment.upvotes = tally.upvotes;
        comment.downvotes = tally.downvotes;
        Ok((comment.clone(), transition))
    }

    async fn find_bookmark(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Bookmark>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookmarks
            .values()
            .find(|b| b.user_id == user_id && b.paper_id == paper_id)
            .cloned())
    }

    async fn insert_bookmark(&self, user_id: i64, paper_id: i64) -> Result<Bookmark, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.papers.contains_key(&paper_id) {
            return Err(StoreError::MissingReference(
                "bookmarks_paper_id_fkey".to_string(),
            ));
        }
        if tables
            .bookmarks
            .values()
            .any(|b| b.user_id == user_id && b.paper_id == paper_id)
        {
            return Err(StoreError::UniqueViolation(
                "unique_user_paper_bookmark".to_string(),
            ));
        }
        let id = tables.next_id();
        let row = Bookmark {
            id,
            user_id,
            paper_id,
            created_at: Utc::now(),
        };
        tables.bookmarks.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_bookmark(&self, user_id: i64, paper_id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.bookmarks.len();
        tables
            .bookmarks
            .retain(|_, b| !(b.user_id == user_id && b.paper_id == paper_id));
        Ok(tables.bookmarks.len() < before)
    }

    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkedPaper>, StoreError> {
        let tables = self.tables.lock().await;
        let mut mine: Vec<&Bookmark> = tables
            .bookmarks
            .values()
            .filter(|b| b.user_id == user_id)
            .collect();
        mine.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        mine.into_iter()
            .map(|bookmark| {
                let paper = tables.papers.get(&bookmark.paper_id).cloned().ok_or_else(|| {
                    StoreError::Integrity(format!(
                        "bookmark {} points at missing paper {}",
                        bookmark.id, bookmark.paper_id
                    ))
                })?;
                Ok(BookmarkedPaper {
                    bookmark: bookmark.clone(),
                    paper,
                })
            })
            .collect()
    }
}
