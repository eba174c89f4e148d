use live_tally::broker::Notification;
use live_tally::tasks::poll_watcher::watch_poll_task;
use live_tally::{handlers, BallotStore, Broker, Config, SqliteStore};
use log::{error, info};
use std::env;
use std::sync::Arc;

const USAGE: &str = "usage: live-tally <results|follow> <poll_id>";

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, poll_id) = match args.as_slice() {
        [command, poll_id] => (command.as_str(), poll_id.clone()),
        _ => {
            eprintln!("{}", USAGE);
            return;
        }
    };

    let store: Arc<dyn BallotStore> = match SqliteStore::connect(&config.database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open database {}: {}", config.database_url, e);
            return;
        }
    };

    match command {
        "results" => print_results(store.as_ref(), &poll_id).await,
        "follow" => follow(store, &config, poll_id).await,
        _ => eprintln!("{}", USAGE),
    }
}

async fn print_results(store: &dyn BallotStore, poll_id: &str) {
    match handlers::current_results(store, poll_id).await {
        Ok(results) => match serde_json::to_string_pretty(&results) {
            Ok(json) => {
                println!("{}", json);
                info!("Poll {}: {:?}", poll_id, results.outcome());
            }
            Err(e) => error!("Failed to encode results: {}", e),
        },
        Err(e) => error!("Failed to get results for poll {}: {}", poll_id, e),
    }
}

// Stream the poll's results as server-sent events on stdout until Ctrl-C
async fn follow(store: Arc<dyn BallotStore>, config: &Config, poll_id: String) {
    let (broker, dispatcher) = Broker::new(config.subscriber_buffer);
    let dispatch = tokio::spawn(dispatcher.run());

    let mut subscription = handlers::watch(&broker, &poll_id);
    let watcher = tokio::spawn(watch_poll_task(
        store,
        broker.clone(),
        poll_id.clone(),
        config.watch_interval,
    ));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            payload = subscription.recv() => match payload {
                Some(payload) => {
                    let notification = Notification {
                        topic: subscription.topic().to_string(),
                        payload,
                    };
                    print!("{}", notification.to_sse_frame());
                }
                None => break,
            },
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    // Unregister before the loops go away
    subscription.unsubscribe();
    watcher.abort();
    drop(broker);
    if let Err(e) = dispatch.await {
        error!("Dispatcher ended abnormally: {}", e);
    }
}
