use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use uuid::Uuid;

/// A write to a watched key, as seen by every handle except the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    /// Revision after the write; 0 when the key was removed.
    pub revision: u64,
    /// Handle that made the write. `Uuid::nil()` for writes observed from
    /// outside this process.
    pub origin: Uuid,
}

/// Receiving end of a store subscription. Dropping it unsubscribes.
pub struct Subscription {
    rx: Receiver<ChangeEvent>,
    _alive: Arc<()>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

struct Subscriber {
    origin: Uuid,
    tx: Sender<ChangeEvent>,
    alive: Weak<()>,
}

/// Fan-out of change events to every subscribed handle sharing one store.
pub struct ChangeHub {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        ChangeHub {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, origin: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(());
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                origin,
                tx,
                alive: Arc::downgrade(&alive),
            });
        Subscription { rx, _alive: alive }
    }

    /// Deliver `event` to every subscriber other than its origin.
    /// Returns the number of subscribers notified; closed subscriptions are pruned.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subs.retain(|sub| {
            if sub.alive.strong_count() == 0 {
                return false;
            }
            if sub.origin == event.origin {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
