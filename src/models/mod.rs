use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::VoteError;

/// Stored vote type for single-choice polls.
pub const VOTE_TYPE_PLURALITY: &str = "simple";
/// Stored vote type for ranked-choice polls.
pub const VOTE_TYPE_RANKED: &str = "ranked";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub created_by: String,
    pub short_description: String,
    pub long_description: String,
    // Kept as the persisted string so a bad value surfaces when tabulating
    pub vote_type: String,
    pub options: Vec<String>,
    pub open: bool,
    pub hidden: bool,
    pub allow_write_ins: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VotingMethod {
    Plurality,
    InstantRunoff,
}

impl VotingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::Plurality => VOTE_TYPE_PLURALITY,
            VotingMethod::InstantRunoff => VOTE_TYPE_RANKED,
        }
    }
}

impl fmt::Display for VotingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingMethod {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" | "plurality" => Ok(VotingMethod::Plurality),
            "ranked" | "instant-runoff" => Ok(VotingMethod::InstantRunoff),
            other => Err(VoteError::UnknownVoteType(other.to_string())),
        }
    }
}

/// A single recorded ballot. Which shape is valid depends on the poll's vote type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Ballot {
    /// One selected option, possibly a write-in.
    Plurality { option: String },
    /// Option name to rank, 1 being the first choice. Unranked options are simply absent.
    Ranked { ranks: HashMap<String, i64> },
}

impl Ballot {
    pub fn plurality(option: impl Into<String>) -> Self {
        Ballot::Plurality {
            option: option.into(),
        }
    }

    pub fn ranked<I, S>(ranks: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Ballot::Ranked {
            ranks: ranks.into_iter().map(|(name, rank)| (name.into(), rank)).collect(),
        }
    }
}

/// What a voter submits before it is validated against the poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum VoteSubmission {
    Choice { option: String },
    Ranking { ranks: HashMap<String, i64> },
}

impl Poll {
    pub fn new(
        created_by: String,
        short_description: String,
        long_description: String,
        voting_method: VotingMethod,
        options: Vec<String>,
        allow_write_ins: bool,
    ) -> Self {
        // Options are unique; the first occurrence keeps its position
        let mut unique: Vec<String> = Vec::with_capacity(options.len());
        for option in options {
            if !unique.contains(&option) {
                unique.push(option);
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            created_by,
            short_description,
            long_description,
            vote_type: voting_method.as_str().to_string(),
            options: unique,
            open: true,
            hidden: false,
            allow_write_ins,
            created_at: Utc::now(),
        }
    }

    /// Parse the stored vote type.
    pub fn voting_method(&self) -> Result<VotingMethod, VoteError> {
        self.vote_type.parse()
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}
