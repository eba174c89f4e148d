//! End-to-end: cast ballots through the handlers and watch results arrive at subscribers.

use futures::StreamExt;
use live_tally::{
    handlers, tabulate, Ballot, BallotStore, Broker, MemoryStore, Outcome, Poll, PollResult,
    SqliteStore, Tally, VoteError, VoteSubmission, VotingMethod,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn start_broker() -> Broker {
    let (broker, dispatcher) = Broker::new(16);
    tokio::spawn(dispatcher.run());
    broker
}

fn new_poll(method: VotingMethod, options: &[&str]) -> Poll {
    Poll::new(
        "alice".to_string(),
        "Spring budget".to_string(),
        "Vote on the proposed budget".to_string(),
        method,
        options.iter().map(|o| o.to_string()).collect(),
        false,
    )
}

fn ranking(entries: &[(&str, i64)]) -> VoteSubmission {
    VoteSubmission::Ranking {
        ranks: entries.iter().map(|(n, r)| (n.to_string(), *r)).collect(),
    }
}

#[tokio::test]
async fn test_plurality_votes_stream_to_watchers() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    let broker = start_broker();
    let poll = new_poll(VotingMethod::Plurality, &["Pass", "Fail", "Abstain"]);
    store.create_poll(&poll).await.unwrap();

    let mut watcher = handlers::watch(&broker, &poll.id);

    let choices = ["Pass", "Pass", "Fail", "Abstain", "Pass"];
    for (i, option) in choices.iter().enumerate() {
        let submission = VoteSubmission::Choice {
            option: option.to_string(),
        };
        handlers::cast_vote(&store, &broker, &poll.id, &format!("voter{}", i), submission)
            .await
            .unwrap();
    }

    // One payload per ballot, the last one holding the full count
    let mut last = None;
    for _ in 0..choices.len() {
        last = timeout(WAIT, watcher.next()).await.unwrap();
    }
    let published: Tally = serde_json::from_str(&last.unwrap()).unwrap();
    assert_eq!(
        published,
        Tally::from([
            ("Pass".to_string(), 3),
            ("Fail".to_string(), 1),
            ("Abstain".to_string(), 1),
        ])
    );

    let results = handlers::poll_results(&store, &poll.id, "bob").await.unwrap();
    assert_eq!(results.outcome(), Outcome::Winner("Pass".to_string()));
}

#[tokio::test]
async fn test_ranked_votes_publish_every_round() {
    let store = MemoryStore::new();
    let broker = start_broker();
    let poll = new_poll(VotingMethod::InstantRunoff, &["A", "B", "C"]);
    store.create_poll(&poll).await.unwrap();

    let mut ballots = Vec::new();
    ballots.extend(std::iter::repeat_n(ranking(&[("A", 1), ("B", 2), ("C", 3)]), 3));
    ballots.extend(std::iter::repeat_n(ranking(&[("B", 1), ("A", 2)]), 2));
    ballots.extend(std::iter::repeat_n(ranking(&[("C", 1)]), 2));

    // Subscribe just before the last ballot so only the final result is seen
    let last = ballots.pop().unwrap();
    for (i, submission) in ballots.into_iter().enumerate() {
        handlers::cast_vote(&store, &broker, &poll.id, &format!("voter{}", i), submission)
            .await
            .unwrap();
    }
    broker.flush().await;
    let mut watcher = handlers::watch(&broker, &poll.id);
    handlers::cast_vote(&store, &broker, &poll.id, "last-voter", last)
        .await
        .unwrap();

    let payload = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
    let rounds: Vec<HashMap<String, u32>> = serde_json::from_str(&payload).unwrap();
    assert_eq!(rounds.len(), 2);
    assert_eq!(
        rounds[0],
        HashMap::from([("A".to_string(), 3), ("B".to_string(), 2), ("C".to_string(), 2)])
    );
    assert_eq!(rounds[1], HashMap::from([("A".to_string(), 5)]));
    assert!(watcher.try_recv().is_none());
}

#[tokio::test]
async fn test_unknown_vote_type_does_not_disturb_other_polls() {
    let store = MemoryStore::new();
    let broker = start_broker();

    let mut broken = new_poll(VotingMethod::Plurality, &["Yes", "No"]);
    broken.vote_type = "borda".to_string();
    store.create_poll(&broken).await.unwrap();
    let healthy = new_poll(VotingMethod::Plurality, &["Yes", "No"]);
    store.create_poll(&healthy).await.unwrap();

    let mut broken_watcher = handlers::watch(&broker, &broken.id);
    let mut healthy_watcher = handlers::watch(&broker, &healthy.id);

    let err = handlers::cast_vote(
        &store,
        &broker,
        &broken.id,
        "bob",
        VoteSubmission::Choice {
            option: "Yes".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, VoteError::UnknownVoteType(ref t) if t == "borda"));

    handlers::cast_vote(
        &store,
        &broker,
        &healthy.id,
        "bob",
        VoteSubmission::Choice {
            option: "No".to_string(),
        },
    )
    .await
    .unwrap();

    let payload = timeout(WAIT, healthy_watcher.recv()).await.unwrap().unwrap();
    let tally: Tally = serde_json::from_str(&payload).unwrap();
    assert_eq!(tally["No"], 1);
    assert!(broken_watcher.try_recv().is_none());
}

#[tokio::test]
async fn test_dropped_watcher_is_unregistered() {
    let store = MemoryStore::new();
    let broker = start_broker();
    let poll = new_poll(VotingMethod::Plurality, &["Yes", "No"]);
    store.create_poll(&poll).await.unwrap();

    {
        let _watcher = handlers::watch(&broker, &poll.id);
        assert_eq!(broker.subscriber_count(&poll.id), 1);
    }
    assert_eq!(broker.subscriber_count(&poll.id), 0);

    // Publishing to a topic nobody watches still succeeds
    let result = handlers::cast_vote(
        &store,
        &broker,
        &poll.id,
        "bob",
        VoteSubmission::Choice {
            option: "Yes".to_string(),
        },
    )
    .await
    .unwrap();
    assert!(matches!(result, PollResult::Plurality(_)));
}

#[test]
fn test_tabulate_directly_from_ballots() {
    let poll = new_poll(VotingMethod::InstantRunoff, &["A", "B"]);
    let ballots = vec![
        Ballot::ranked([("A", 1), ("B", 2)]),
        Ballot::ranked([("A", 1), ("B", 1)]),
        Ballot::ranked([("B", 1)]),
        Ballot::ranked([("A", 2)]),
    ];

    // The duplicate-rank ballot is exhausted, leaving A 2 to B 1
    let result = tabulate(&poll, &ballots).unwrap();
    assert_eq!(
        result,
        PollResult::InstantRunoff(vec![Tally::from([
            ("A".to_string(), 2),
            ("B".to_string(), 1),
        ])])
    );
    assert_eq!(result.outcome(), Outcome::Winner("A".to_string()));
}
