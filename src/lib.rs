//! Live poll results
//!
//! Tabulates poll ballots (plurality or instant-runoff) and pushes each freshly computed
//! result to every client watching that poll.
//!
//! # Modules
//!
//! - `voting`: the tabulator, pure functions from ballots to a result
//! - `broker`: in-process pub/sub keyed by poll id
//! - `tasks`: the broker's dispatch loop and the poll watcher
//! - `db`: ballot store trait with SQLite and in-memory implementations
//! - `handlers`: cast a vote, recompute, publish
//! - `models`, `config`, `error`

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod tasks;
pub mod voting;

pub use broker::{Broker, Notification, Subscription};
pub use config::Config;
pub use db::{BallotStore, MemoryStore, SqliteStore};
pub use error::{VoteError, VoteResult};
pub use models::{Ballot, Poll, VoteSubmission, VotingMethod};
pub use voting::{tabulate, Outcome, PollResult, Tally};
