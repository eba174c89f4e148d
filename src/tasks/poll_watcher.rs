use crate::broker::Broker;
use crate::db::BallotStore;
use crate::handlers::publish_results;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Republish a poll's results whenever its ballot count changes.
///
/// For ballots cast by another process sharing the same database, which never goes through
/// this process's broker. Runs until the task is aborted.
pub async fn watch_poll_task(
    store: Arc<dyn BallotStore>,
    broker: Broker,
    poll_id: String,
    period: Duration,
) {
    info!("Watching poll {} every {:?}", poll_id, period);
    let mut interval = interval(period);
    let mut last_count: Option<usize> = None;

    loop {
        interval.tick().await;

        let count = match store.ballot_count(&poll_id).await {
            Ok(count) => count,
            Err(e) => {
                error!("Failed to count ballots for poll {}: {}", poll_id, e);
                continue;
            }
        };
        if last_count == Some(count) {
            continue;
        }

        debug!("Poll {} now has {} ballot(s)", poll_id, count);
        match publish_results(store.as_ref(), &broker, &poll_id).await {
            Ok(_) => last_count = Some(count),
            Err(e) => error!("Failed to publish results for poll {}: {}", poll_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Ballot, Poll, VotingMethod};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_publishes_initial_and_changed_results() {
        let store = Arc::new(MemoryStore::new());
        let poll = Poll::new(
            "alice".to_string(),
            "Snacks".to_string(),
            String::new(),
            VotingMethod::Plurality,
            vec!["Chips".to_string(), "Fruit".to_string()],
            false,
        );
        store.create_poll(&poll).await.unwrap();

        let (broker, dispatcher) = Broker::new(8);
        tokio::spawn(dispatcher.run());
        let mut sub = broker.subscribe(&poll.id);

        let task = tokio::spawn(watch_poll_task(
            store.clone(),
            broker.clone(),
            poll.id.clone(),
            Duration::from_millis(20),
        ));

        let first = timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
        let tally: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(tally, serde_json::json!({"Chips": 0, "Fruit": 0}));

        store
            .record_ballot(&poll.id, "bob", &Ballot::plurality("Fruit"))
            .await
            .unwrap();
        let second = timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
        let tally: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(tally, serde_json::json!({"Chips": 0, "Fruit": 1}));

        task.abort();
    }
}
