use crate::db::BallotStore;
use crate::error::{VoteError, VoteResult};
use crate::models::{Ballot, Poll};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct PollRecord {
    poll: Poll,
    ballots: Vec<Ballot>,
    voters: HashSet<String>,
}

/// Ballot store kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    polls: RwLock<HashMap<String, PollRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BallotStore for MemoryStore {
    async fn create_poll(&self, poll: &Poll) -> VoteResult<()> {
        self.polls.write().insert(
            poll.id.clone(),
            PollRecord {
                poll: poll.clone(),
                ballots: Vec::new(),
                voters: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn fetch_poll(&self, poll_id: &str) -> VoteResult<Poll> {
        self.polls
            .read()
            .get(poll_id)
            .map(|record| record.poll.clone())
            .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))
    }

    async fn fetch_ballots(&self, poll_id: &str) -> VoteResult<Vec<Ballot>> {
        self.polls
            .read()
            .get(poll_id)
            .map(|record| record.ballots.clone())
            .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))
    }

    async fn has_voted(&self, poll_id: &str, voter: &str) -> VoteResult<bool> {
        Ok(self
            .polls
            .read()
            .get(poll_id)
            .is_some_and(|record| record.voters.contains(voter)))
    }

    async fn record_ballot(&self, poll_id: &str, voter: &str, ballot: &Ballot) -> VoteResult<()> {
        let mut polls = self.polls.write();
        let record = polls
            .get_mut(poll_id)
            .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))?;
        if !record.voters.insert(voter.to_string()) {
            return Err(VoteError::AlreadyVoted);
        }
        record.ballots.push(ballot.clone());
        Ok(())
    }

    async fn ballot_count(&self, poll_id: &str) -> VoteResult<usize> {
        self.polls
            .read()
            .get(poll_id)
            .map(|record| record.ballots.len())
            .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))
    }
}
