use crate::broker::{Broker, Subscription};
use crate::db::BallotStore;
use crate::error::{VoteError, VoteResult};
use crate::models::{Ballot, Poll, VoteSubmission, VotingMethod};
use crate::voting::{self, PollResult};
use log::{error, info, warn};
use std::collections::HashMap;

/// Cast a voter's ballot, then recompute the poll's result and push it to its watchers.
///
/// The ballot is validated against the poll first: single-choice polls take one declared
/// option or, when allowed, a write-in; ranked polls take a rank per option, dropping
/// non-positive ranks.
pub async fn cast_vote(
    store: &dyn BallotStore,
    broker: &Broker,
    poll_id: &str,
    voter: &str,
    submission: VoteSubmission,
) -> VoteResult<PollResult> {
    let poll = store.fetch_poll(poll_id).await?;
    if !poll.open {
        return Err(VoteError::PollClosed);
    }
    if store.has_voted(&poll.id, voter).await? {
        return Err(VoteError::AlreadyVoted);
    }

    let ballot = build_ballot(&poll, submission)?;
    store.record_ballot(&poll.id, voter, &ballot).await?;
    info!("Recorded ballot from {} in poll {}", voter, poll.id);

    publish_results(store, broker, &poll.id).await
}

/// Validate a submission against the poll and turn it into a ballot.
pub fn build_ballot(poll: &Poll, submission: VoteSubmission) -> VoteResult<Ballot> {
    match (poll.voting_method()?, submission) {
        (VotingMethod::Plurality, VoteSubmission::Choice { option }) => {
            if poll.has_option(&option) {
                return Ok(Ballot::Plurality { option });
            }
            let write_in = option.trim();
            if poll.allow_write_ins && !write_in.is_empty() {
                Ok(Ballot::plurality(write_in))
            } else {
                Err(VoteError::InvalidOption(option))
            }
        }
        (VotingMethod::InstantRunoff, VoteSubmission::Ranking { ranks }) => {
            let mut by_name: HashMap<String, Vec<i64>> = HashMap::with_capacity(ranks.len());
            for (name, rank) in ranks {
                // Unranked
                if rank <= 0 {
                    continue;
                }
                let key = if poll.has_option(&name) {
                    name
                } else {
                    let write_in = name.trim();
                    if !poll.allow_write_ins || write_in.is_empty() {
                        return Err(VoteError::InvalidOption(name));
                    }
                    write_in.to_string()
                };
                by_name.entry(key).or_default().push(rank);
            }

            // Entries naming the same candidate once trimmed have no single rank to keep
            let kept = by_name
                .into_iter()
                .filter_map(|(name, ranks)| match ranks.as_slice() {
                    [rank] => Some((name, *rank)),
                    _ => {
                        warn!("Dropping {:?}, ranked {} times on one ballot", name, ranks.len());
                        None
                    }
                })
                .collect();
            Ok(Ballot::Ranked { ranks: kept })
        }
        (method, submission) => Err(VoteError::InvalidOption(format!(
            "{:?} cannot be cast in a {} poll",
            submission, method
        ))),
    }
}

/// Tabulate the poll as it stands in the store.
pub async fn current_results(store: &dyn BallotStore, poll_id: &str) -> VoteResult<PollResult> {
    let poll = store.fetch_poll(poll_id).await?;
    let ballots = store.fetch_ballots(&poll.id).await?;
    voting::tabulate(&poll, &ballots).inspect_err(|e| {
        error!("Failed to tabulate poll {}: {}", poll.id, e);
    })
}

/// Recompute a poll's result and publish it to everyone watching the poll.
///
/// Nothing is published when the store or the tabulator fails.
pub async fn publish_results(
    store: &dyn BallotStore,
    broker: &Broker,
    poll_id: &str,
) -> VoteResult<PollResult> {
    let results = current_results(store, poll_id).await?;
    let payload = serde_json::to_string(&results)?;
    broker.publish(poll_id, payload);
    Ok(results)
}

/// Results as shown to `viewer`. Hidden polls only show results to their creator.
pub async fn poll_results(
    store: &dyn BallotStore,
    poll_id: &str,
    viewer: &str,
) -> VoteResult<PollResult> {
    let poll = store.fetch_poll(poll_id).await?;
    if poll.hidden && poll.created_by != viewer {
        warn!("{} asked for hidden results of poll {}", viewer, poll.id);
        return Err(VoteError::ResultsHidden);
    }
    current_results(store, &poll.id).await
}

/// Follow a poll's live results.
pub fn watch(broker: &Broker, poll_id: &str) -> Subscription {
    broker.subscribe(poll_id)
}
