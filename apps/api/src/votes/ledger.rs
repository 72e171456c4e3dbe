//! Vote ledger rules.
//!
//! One vote row per (user, comment). The denormalized `upvotes`/`downvotes`
//! counters on the comment must always equal the per-type counts in the
//! ledger, so every vote is planned as a [`VoteTransition`] and the counters
//! are moved by exactly that transition inside the same store transaction.

use thiserror::Error;

use crate::models::comment::Comment;
use crate::models::vote::VoteType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{vote_type} counter on comment {comment_id} would drop below zero")]
    NegativeCounter { comment_id: i64, vote_type: VoteType },
}

/// What a vote request does to the ledger row for (user, comment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior vote: insert a row and bump the matching counter.
    Create(VoteType),
    /// Same type as the existing vote: nothing changes.
    Unchanged,
    /// Existing vote of the other type: move one count across.
    Flip { from: VoteType, to: VoteType },
}

impl VoteTransition {
    pub fn plan(existing: Option<VoteType>, requested: VoteType) -> Self {
        match existing {
            None => VoteTransition::Create(requested),
            Some(current) if current == requested => VoteTransition::Unchanged,
            Some(current) => VoteTransition::Flip {
                from: current,
                to: requested,
            },
        }
    }

    /// The vote type the ledger row must hold afterwards, if it is written.
    pub fn written_type(&self) -> Option<VoteType> {
        match self {
            VoteTransition::Create(t) => Some(*t),
            VoteTransition::Flip { to, .. } => Some(*to),
            VoteTransition::Unchanged => None,
        }
    }
}

/// Counter pair of a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub upvotes: i32,
    pub downvotes: i32,
}

impl From<&Comment> for Tally {
    fn from(comment: &Comment) -> Self {
        Tally {
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        }
    }
}

impl Tally {
    /// Applies a transition. A decrement below zero means the counters and
    /// the ledger have drifted apart and is refused.
    pub fn apply(
        self,
        comment_id: i64,
        transition: VoteTransition,
    ) -> Result<Tally, LedgerError> {
        match transition {
            VoteTransition::Unchanged => Ok(self),
            VoteTransition::Create(t) => Ok(self.increment(t)),
            VoteTransition::Flip { from, to } => {
                Ok(self.decrement(comment_id, from)?.increment(to))
            }
        }
    }

    fn increment(mut self, vote_type: VoteType) -> Tally {
        match vote_type {
            VoteType::Upvote => self.upvotes += 1,
            VoteType::Downvote => self.downvotes += 1,
        }
        self
    }

    fn decrement(mut self, comment_id: i64, vote_type: VoteType) -> Result<Tally, LedgerError> {
        let counter = match vote_type {
            VoteType::Upvote => &mut self.upvotes,
            VoteType::Downvote => &mut self.downvotes,
        };
        if *counter <= 0 {
            return Err(LedgerError::NegativeCounter {
                comment_id,
                vote_type,
            });
        }
        *counter -= 1;
        Ok(self)
    }
}
