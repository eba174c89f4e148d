pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::VoteResult;
use crate::models::{Ballot, Poll};
use async_trait::async_trait;

/// Where polls and cast ballots live. The tabulator only ever reads from it.
#[async_trait]
pub trait BallotStore: Send + Sync {
    async fn create_poll(&self, poll: &Poll) -> VoteResult<()>;

    /// Fails with `PollNotFound` for an unknown id.
    async fn fetch_poll(&self, poll_id: &str) -> VoteResult<Poll>;

    /// Every ballot cast in the poll, in no particular order.
    async fn fetch_ballots(&self, poll_id: &str) -> VoteResult<Vec<Ballot>>;

    async fn has_voted(&self, poll_id: &str, voter: &str) -> VoteResult<bool>;

    /// Store a ballot together with the voter's "has voted" marker.
    /// A second ballot from the same voter fails with `AlreadyVoted`.
    async fn record_ballot(&self, poll_id: &str, voter: &str, ballot: &Ballot) -> VoteResult<()>;

    async fn ballot_count(&self, poll_id: &str) -> VoteResult<usize> {
        Ok(self.fetch_ballots(poll_id).await?.len())
    }
}
