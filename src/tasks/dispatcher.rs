use crate::broker::{Command, Registry};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The broker's single dispatch loop.
///
/// Drains the publish queue in order and fans each payload out under the registry lock, so
/// fan-out never interleaves with a subscribe or unsubscribe. Delivery itself never waits on a
/// subscriber.
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
    queue: mpsc::UnboundedReceiver<Command>,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<Mutex<Registry>>,
        queue: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self { registry, queue }
    }

    /// Run until every broker handle has been dropped.
    pub async fn run(mut self) {
        info!("Starting notification dispatcher...");
        while let Some(command) = self.queue.recv().await {
            match command {
                Command::Publish(notification) => {
                    let delivered = self.registry.lock().deliver(&notification);
                    debug!(
                        "Delivered payload for {} to {} subscriber(s)",
                        notification.topic, delivered
                    );
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!("Notification dispatcher stopped.");
    }
}
