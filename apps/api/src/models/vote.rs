use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger row: at most one per (user, comment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub comment_id: i64,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vote type '{0}'")]
pub struct UnknownVoteType(pub String);

impl FromStr for VoteType {
    type Err = UnknownVoteType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(UnknownVoteType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_only_the_two_literals() {
        assert_eq!("upvote".parse::<VoteType>(), Ok(VoteType::Upvote));
        assert_eq!("downvote".parse::<VoteType>(), Ok(VoteType::Downvote));
        assert!("Upvote".parse::<VoteType>().is_err());
        assert_eq!(
            "like".parse::<VoteType>().unwrap_err().to_string(),
            "unknown vote type 'like'"
        );
    }
}
