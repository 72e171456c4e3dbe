//! Comment tree engine.
//!
//! Comments are stored flat with a parent back-reference. A thread is
//! rebuilt per request from an adjacency map (parent id -> child ids):
//!
//! - roots are the paper's comments without a parent, highest net score
//!   first, ties by creation time then id
//! - replies at every depth are chronological, ties by id
//!
//! Parent chains are checked for cycles before the tree is assembled, and
//! the assembly itself is iterative so depth is bounded only by memory.

use std::cmp::Reverse;
use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::models::comment::{Comment, CommentNode};
use crate::store::Store;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThreadError {
    #[error("comment {0} is part of a parent cycle")]
    Cycle(i64),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Walking,
    Done,
}

/// Ordered thread of a paper. Unknown papers are `NotFound`.
pub async fn list_thread(
    store: &dyn Store,
    paper_id: i64,
) -> Result<Vec<CommentNode>, AppError> {
    if store.get_paper(paper_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Paper {paper_id} not found")));
    }
    let comments = store.thread_comments(paper_id).await?;
    Ok(build_thread(paper_id, comments)?)
}

/// Builds the ordered reply tree for `paper_id` from a flat set of comments.
///
/// `comments` may contain replies recorded on other papers; they are attached
/// under their parent but never become roots of this thread.
pub fn build_thread(
    paper_id: i64,
    comments: Vec<Comment>,
) -> Result<Vec<CommentNode>, ThreadError> {
    let by_id: HashMap<i64, &Comment> = comments.iter().map(|c| (c.id, c)).collect();
    detect_cycles(&by_id)?;

    let mut children: HashMap<i64, Vec<&Comment>> = HashMap::new();
    let mut roots: Vec<&Comment> = Vec::new();
    for comment in &comments {
        match comment.parent_id {
            Some(parent) if by_id.contains_key(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            Some(_) => {}
            None if comment.paper_id == paper_id => roots.push(comment),
            None => {}
        }
    }

    roots.sort_by_key(|c| (Reverse(c.score()), c.created_at, c.id));
    for replies in children.values_mut() {
        replies.sort_by_key(|c| (c.created_at, c.id));
    }

    // Pre-order walk; building in reverse guarantees children exist before
    // their parent is assembled.
    let mut order: Vec<i64> = Vec::with_capacity(comments.len());
    let mut stack: Vec<i64> = roots.iter().rev().map(|c| c.id).collect();
    while let Some(id) = stack.pop() {
        order.push(id);
        if let Some(replies) = children.get(&id) {
            stack.extend(replies.iter().rev().map(|c| c.id));
        }
    }

    let reachable = order.len();
    let mut built: HashMap<i64, CommentNode> = HashMap::with_capacity(reachable);
    for id in order.into_iter().rev() {
        let replies = children
            .get(&id)
            .map(|kids| kids.iter().filter_map(|k| built.remove(&k.id)).collect())
            .unwrap_or_default();
        if let Some(comment) = by_id.get(&id) {
            built.insert(
                id,
                CommentNode {
                    comment: (*comment).clone(),
                    replies,
                },
            );
        }
    }

    if reachable < comments.len() {
        debug!(
            "Thread for paper {paper_id}: {} comment(s) not reachable from a root",
            comments.len() - reachable
        );
    }

    Ok(roots
        .iter()
        .filter_map(|root| built.remove(&root.id))
        .collect())
}

enum Emit<'a> {
    Node { node: &'a CommentNode, first: bool },
    Close,
}

/// Serializes a thread as a JSON array of comments, each carrying its own
/// `replies` array. Uses an explicit stack so depth costs heap, not stack.
pub fn thread_json(roots: &[CommentNode]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(256 * roots.len().max(1));
    out.push(b'[');

    let mut stack: Vec<Emit<'_>> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| Emit::Node { node, first: i == 0 })
        .collect();

    while let Some(step) = stack.pop() {
        match step {
            Emit::Node { node, first } => {
                if !first {
                    out.push(b',');
                }
                // Reopen the comment object to append its replies.
                serde_json::to_writer(&mut out, &node.comment)?;
                out.pop();
                out.extend_from_slice(b",\"replies\":[");
                stack.push(Emit::Close);
                stack.extend(
                    node.replies
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(i, node)| Emit::Node { node, first: i == 0 }),
                );
            }
            Emit::Close => out.extend_from_slice(b"]}"),
        }
    }

    out.push(b']');
    Ok(out)
}

fn detect_cycles(by_id: &HashMap<i64, &Comment>) -> Result<(), ThreadError> {
    let mut marks: HashMap<i64, Mark> = HashMap::with_capacity(by_id.len());
    for &start in by_id.keys() {
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            match marks.get(&id) {
                Some(Mark::Done) => break,
                Some(Mark::Walking) => return Err(ThreadError::Cycle(id)),
                None => {}
            }
            marks.insert(id, Mark::Walking);
            path.push(id);
            current = by_id
                .get(&id)
                .and_then(|c| c.parent_id)
                .filter(|parent| by_id.contains_key(parent));
        }
        for id in path {
            marks.insert(id, Mark::Done);
        }
    }
    Ok(())
}
