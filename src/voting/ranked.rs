use crate::models::Ballot;
use crate::voting::Tally;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap, HashSet};

/// How a single runoff round ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundVerdict {
    /// Someone holds more than half of the votes counted this round.
    Majority(String),
    /// Only one candidate is left in the count.
    LastStanding(String),
    /// Every remaining candidate is level; eliminating any would eliminate all.
    Tie,
    /// Nothing left to count.
    Exhausted,
    /// Drop every candidate sitting on the round's minimum and count again.
    Eliminate(Vec<String>),
}

impl RoundVerdict {
    pub fn is_final(&self) -> bool {
        !matches!(self, RoundVerdict::Eliminate(_))
    }
}

/// Turn a rank mapping into a first-to-last preference list.
///
/// Non-positive ranks are dropped, and so is every entry sharing a rank with another entry,
/// since the voter's order between them is unknown. Ranks need not be contiguous.
pub fn preference_order(ranks: &HashMap<String, i64>) -> Vec<String> {
    let mut uses: HashMap<i64, usize> = HashMap::new();
    for rank in ranks.values().filter(|rank| **rank > 0) {
        *uses.entry(*rank).or_insert(0) += 1;
    }

    let mut picks: Vec<(i64, &String)> = ranks
        .iter()
        .filter(|(_, rank)| uses.get(*rank) == Some(&1))
        .map(|(name, rank)| (*rank, name))
        .collect();
    picks.sort();

    picks.into_iter().map(|(_, name)| name.clone()).collect()
}

/// Count one round: each ballot goes to its highest-ranked candidate still standing.
///
/// Every candidate still standing appears in the tally, even with zero votes. Ballots whose
/// whole list has been eliminated count for nobody.
pub fn count_round(
    candidates: &BTreeSet<String>,
    preferences: &[Vec<String>],
    eliminated: &HashSet<String>,
) -> Tally {
    let mut tally: Tally = candidates
        .iter()
        .filter(|name| !eliminated.contains(*name))
        .map(|name| (name.clone(), 0))
        .collect();

    for picks in preferences {
        if let Some(choice) = picks.iter().find(|name| !eliminated.contains(*name)) {
            *tally.entry(choice.clone()).or_insert(0) += 1;
        }
    }

    tally
}

/// Decide what happens after a round. Checks run in order: majority, last one standing, tie.
pub fn judge_round(tally: &Tally) -> RoundVerdict {
    let Some(min_votes) = tally.values().copied().min() else {
        return RoundVerdict::Exhausted;
    };

    let votes_cast: u32 = tally.values().sum();
    if let Some((name, _)) = tally.iter().find(|(_, count)| **count > votes_cast / 2) {
        return RoundVerdict::Majority(name.clone());
    }

    if tally.len() == 1 {
        if let Some(name) = tally.keys().next() {
            return RoundVerdict::LastStanding(name.clone());
        }
    }

    if tally.values().all(|count| *count == min_votes) {
        return RoundVerdict::Tie;
    }

    let mut losers: Vec<String> = tally
        .iter()
        .filter(|(_, count)| **count == min_votes)
        .map(|(name, _)| name.clone())
        .collect();
    losers.sort();
    RoundVerdict::Eliminate(losers)
}

// Elimination state carried from one round into the next
#[derive(Debug, Default)]
struct Runoff {
    eliminated: HashSet<String>,
    rounds: Vec<Tally>,
}

impl Runoff {
    fn next_round(
        mut self,
        candidates: &BTreeSet<String>,
        preferences: &[Vec<String>],
    ) -> (Self, RoundVerdict) {
        let tally = count_round(candidates, preferences, &self.eliminated);
        let verdict = judge_round(&tally);
        if let RoundVerdict::Eliminate(losers) = &verdict {
            self.eliminated.extend(losers.iter().cloned());
        }
        self.rounds.push(tally);
        (self, verdict)
    }
}

/// Run instant-runoff over the ranked ballots and return every round in the order counted.
///
/// Candidates are the declared options plus any write-in a ballot ranks. Each round that does
/// not end the count eliminates at least one candidate, so there are never more rounds than
/// candidates (plus one when there are no candidates at all).
pub fn calculate_rounds(options: &[String], ballots: &[Ballot]) -> Vec<Tally> {
    let mut preferences: Vec<Vec<String>> = Vec::with_capacity(ballots.len());
    for ballot in ballots {
        match ballot {
            Ballot::Ranked { ranks } => {
                let picks = preference_order(ranks);
                if picks.len() < ranks.len() {
                    debug!(
                        "Dropped {} invalid rank(s) from a ballot",
                        ranks.len() - picks.len()
                    );
                }
                if !picks.is_empty() {
                    preferences.push(picks);
                }
            }
            Ballot::Plurality { .. } => {
                warn!("Skipping single-choice ballot in a ranked count");
            }
        }
    }

    let candidates: BTreeSet<String> = options
        .iter()
        .cloned()
        .chain(preferences.iter().flatten().cloned())
        .collect();

    let mut runoff = Runoff::default();
    loop {
        let (next, verdict) = runoff.next_round(&candidates, &preferences);
        runoff = next;
        if verdict.is_final() {
            debug!(
                "Runoff finished after {} round(s): {:?}",
                runoff.rounds.len(),
                verdict
            );
            return runoff.rounds;
        }
    }
}
