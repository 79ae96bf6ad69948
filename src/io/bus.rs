use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::model::event::{CompletionEvent, ViewId};

const CAPACITY: usize = 64;

/// Completion broadcasts between views that hold copies of the same items.
/// Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompletionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        EventBus { tx }
    }

    /// Send to every subscriber. Returns how many received it.
    pub fn publish(&self, event: CompletionEvent) -> usize {
        debug!(item = %event.item_id, origin = %event.origin, "publish completion");
        self.tx.send(event).unwrap_or(0)
    }

    /// Listen as `view`; events published by `view` itself are skipped
    pub fn subscribe(&self, view: ViewId) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            view,
        }
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<CompletionEvent>,
    view: ViewId,
}

impl Subscription {
    /// Next event from another view; None once every sender is gone
    pub async fn recv(&mut self) -> Option<CompletionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.view => continue,
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(view = %self.view, skipped = n, "completion events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drain whatever is already queued without waiting
    pub fn drain(&mut self) -> Vec<CompletionEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.view => {}
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(view = %self.view, skipped = n, "completion events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        events
    }
}
