pub mod plurality;
pub mod ranked;

use crate::error::VoteError;
use crate::models::{Ballot, Poll, VotingMethod};
use serde::Serialize;
use std::collections::HashMap;

/// Option name to vote count for one count (a plurality result or one runoff round).
pub type Tally = HashMap<String, u32>;

// Serialized wire form: plurality is a single object, instant-runoff an array of rounds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PollResult {
    Plurality(Tally),
    InstantRunoff(Vec<Tally>),
}

/// Who is currently ahead, judged from a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Winner(String),
    Tie(Vec<String>),
    NoVotes,
}

/// Compute the current standing of a poll from its recorded ballots.
///
/// Pure: no I/O and no shared state, so concurrent calls need no locking.
/// Fails only when the poll's stored vote type is not one the tabulator knows.
pub fn tabulate(poll: &Poll, ballots: &[Ballot]) -> Result<PollResult, VoteError> {
    let result = match poll.voting_method()? {
        VotingMethod::Plurality => {
            PollResult::Plurality(plurality::calculate_tally(&poll.options, ballots))
        }
        VotingMethod::InstantRunoff => {
            PollResult::InstantRunoff(ranked::calculate_rounds(&poll.options, ballots))
        }
    };
    Ok(result)
}

impl PollResult {
    /// The tally the outcome is read from: the whole plurality count, or the final runoff round.
    pub fn final_tally(&self) -> Option<&Tally> {
        match self {
            PollResult::Plurality(tally) => Some(tally),
            PollResult::InstantRunoff(rounds) => rounds.last(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        let Some(tally) = self.final_tally() else {
            return Outcome::NoVotes;
        };
        if tally.values().all(|count| *count == 0) {
            return Outcome::NoVotes;
        }

        if let PollResult::InstantRunoff(_) = self {
            match ranked::judge_round(tally) {
                ranked::RoundVerdict::Majority(name) | ranked::RoundVerdict::LastStanding(name) => {
                    return Outcome::Winner(name);
                }
                ranked::RoundVerdict::Tie => return Outcome::Tie(sorted_names(tally.keys())),
                // A final round always ends the runoff, fall back to the leader otherwise
                ranked::RoundVerdict::Exhausted | ranked::RoundVerdict::Eliminate(_) => {}
            }
        }

        leader(tally)
    }
}

// Highest count wins; several options sharing the highest count are a tie
fn leader(tally: &Tally) -> Outcome {
    let top = tally.values().copied().max().unwrap_or(0);
    let mut leaders = sorted_names(
        tally
            .iter()
            .filter(|(_, count)| **count == top)
            .map(|(name, _)| name),
    );
    match leaders.len() {
        0 => Outcome::NoVotes,
        1 => Outcome::Winner(leaders.remove(0)),
        _ => Outcome::Tie(leaders),
    }
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut names: Vec<String> = names.cloned().collect();
    names.sort();
    names
}
