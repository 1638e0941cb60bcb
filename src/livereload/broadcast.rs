//! Fan-out of reload messages to connected viewers.
//!
//! Each subscriber owns a capacity-1 channel. Broadcasting never blocks: a
//! subscriber that has not consumed its previous message simply misses the
//! new one, which is fine since any pending message already triggers a
//! reload on the client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::message::ReloadMessage;

/// Subscriber set shared by the watcher and every stream.
#[derive(Debug, Default)]
pub struct Broadcaster {
    subscribers: Mutex<FxHashMap<u64, Sender<ReloadMessage>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new subscriber.
    pub fn subscribe(self: &Arc<Self>) -> Subscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(1);
        self.subscribers.lock().insert(id, tx);
        crate::debug!("reload"; "subscriber {} connected", id);
        Subscriber {
            id,
            rx,
            owner: Arc::clone(self),
        }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.lock().remove(&id).is_some() {
            crate::debug!("reload"; "subscriber {} disconnected", id);
        }
    }

    /// Offer `message` to every subscriber without blocking.
    pub fn broadcast(&self, message: &ReloadMessage) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(message.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => {
                crate::debug!("reload"; "pruning closed subscriber {}", id);
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Receiving end of a subscription. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    rx: Receiver<ReloadMessage>,
    owner: Arc<Broadcaster>,
}

impl Subscriber {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<ReloadMessage> {
        &self.rx
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.owner.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let hub = Broadcaster::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.broadcast(&ReloadMessage::Reload);
        assert_eq!(a.receiver().try_recv().unwrap(), ReloadMessage::Reload);
        assert_eq!(b.receiver().try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[test]
    fn test_slow_subscriber_does_not_block_others() {
        let hub = Broadcaster::new();
        let slow = hub.subscribe();
        let fast = hub.subscribe();

        hub.broadcast(&ReloadMessage::Reload);
        assert_eq!(fast.receiver().try_recv().unwrap(), ReloadMessage::Reload);

        // slow still holds the first message; the second is dropped for it only
        hub.broadcast(&ReloadMessage::Error("boom".into()));
        assert_eq!(
            fast.receiver().try_recv().unwrap(),
            ReloadMessage::Error("boom".into())
        );
        assert_eq!(slow.receiver().try_recv().unwrap(), ReloadMessage::Reload);
        assert!(slow.receiver().try_recv().is_err());
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Broadcaster::new();
        let sub = hub.subscribe();
        let other = hub.subscribe();
        assert_ne!(sub.id(), other.id());
        assert_eq!(hub.subscriber_count(), 2);

        drop(sub);
        assert_eq!(hub.subscriber_count(), 1);
        hub.broadcast(&ReloadMessage::Reload);
        assert_eq!(other.receiver().try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let hub = Broadcaster::new();
        let sub = hub.subscribe();
        hub.unsubscribe(sub.id());
        hub.unsubscribe(sub.id());
        assert_eq!(hub.subscriber_count(), 0);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
