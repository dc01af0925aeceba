// Change feed: in-process fan-out of post-insert notifications.
//
// Stores publish here after a successful insert; the feed layer subscribes
// and resets itself on every event. A broadcast channel drops the oldest
// events for slow receivers, which then see `RecvError::Lagged` and treat
// it as "something changed".

use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast buffer before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    PostInserted { post_id: String },
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Change event published"),
            Err(_) => debug!("Change event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}
