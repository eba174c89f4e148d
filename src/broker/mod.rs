//! Live-result notification broker
//!
//! Publishers hand a payload to the broker under a topic (a poll id). A single dispatch loop
//! (see [`crate::tasks::dispatcher`]) drains the publish queue and pushes each payload to every
//! subscriber registered for that topic at that moment.
//!
//! Delivery is at-most-once: nothing is buffered for topics without subscribers, and a
//! subscriber whose buffer is full loses that payload instead of holding up the fan-out.

use futures::Stream;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use crate::tasks::dispatcher::Dispatcher;

/// Default number of undelivered payloads a subscriber may hold before new ones are dropped.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

pub type SubscriberId = u64;

/// A payload published under a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub payload: String,
}

impl Notification {
    /// Render as a server-sent-events frame.
    pub fn to_sse_frame(&self) -> String {
        let mut frame = format!("event: {}\n", self.topic);
        for line in self.payload.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        if self.payload.is_empty() {
            frame.push_str("data: \n");
        }
        frame.push('\n');
        frame
    }
}

/// What travels over the publish queue.
#[derive(Debug)]
pub(crate) enum Command {
    Publish(Notification),
    /// Answered once everything queued before it has been fanned out.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    next_id: SubscriberId,
    topics: HashMap<String, HashMap<SubscriberId, mpsc::Sender<String>>>,
}

impl Registry {
    fn insert(&mut self, topic: &str, sender: mpsc::Sender<String>) -> SubscriberId {
        let id = self.next_id;
        self.next_id += 1;
        self.topics
            .entry(topic.to_string())
            .or_default()
            .insert(id, sender);
        id
    }

    fn remove(&mut self, topic: &str, id: SubscriberId) -> bool {
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    fn count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashMap::len)
    }

    /// Push a payload to every subscriber of its topic, returning how many accepted it.
    pub(crate) fn deliver(&mut self, notification: &Notification) -> usize {
        let Some(subscribers) = self.topics.get_mut(&notification.topic) else {
            debug!("No subscribers for {}, dropping payload", notification.topic);
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in subscribers.iter() {
            match sender.try_send(notification.payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Subscriber {} on {} is not keeping up, dropping payload",
                        id, notification.topic
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        // Receivers that went away without unsubscribing
        for id in closed {
            debug!("Pruning closed subscriber {} on {}", id, notification.topic);
            subscribers.remove(&id);
        }
        let empty = subscribers.is_empty();
        if empty {
            self.topics.remove(&notification.topic);
        }

        delivered
    }
}

/// Handle for publishing and subscribing. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    registry: Arc<Mutex<Registry>>,
    notifier: mpsc::UnboundedSender<Command>,
    buffer: usize,
}

impl Broker {
    /// Create a broker and the dispatch loop that must be spawned to drive it.
    pub fn new(buffer: usize) -> (Self, Dispatcher) {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (notifier, queue) = mpsc::unbounded_channel();
        let broker = Self {
            registry: Arc::clone(&registry),
            notifier,
            buffer: buffer.max(1),
        };
        (broker, Dispatcher::new(registry, queue))
    }

    /// Start receiving payloads published under `topic` from now on.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.registry.lock().insert(topic, sender);
        debug!("Subscriber {} joined {}", id, topic);
        Subscription {
            id,
            topic: topic.to_string(),
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) -> bool {
        let removed = self.registry.lock().remove(topic, id);
        if removed {
            debug!("Subscriber {} left {}", id, topic);
        }
        removed
    }

    /// Queue a payload for every current subscriber of `topic`. Never blocks and never fails.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) {
        let notification = Notification {
            topic: topic.to_string(),
            payload: payload.into(),
        };
        if self.notifier.send(Command::Publish(notification)).is_err() {
            warn!("Dispatcher is not running, dropping payload for {}", topic);
        }
    }

    /// Wait until every payload published before this call has been handed to its subscribers.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.notifier.send(Command::Flush(done)).is_ok() {
            // An error means the dispatcher is gone and there is nothing left to wait for
            let _ = wait.await;
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.lock().count(topic)
    }
}

/// One open subscription. Yields payloads in publish order; dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    topic: String,
    receiver: mpsc::Receiver<String>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload. `None` once the subscription has been removed.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Take a payload that has already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.lock().remove(&self.topic, self.id) {
            debug!("Subscriber {} left {}", self.id, self.topic);
        }
    }
}
