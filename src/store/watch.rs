//! Snapshot fan-out to open subscriptions

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::{Snapshot, StorePath};

/// Stream of snapshots for one path. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Snapshot> { self.rx.recv().await }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.rx.poll_recv(cx)
    }
}

struct Watcher {
    path: StorePath,
    tx: mpsc::UnboundedSender<Snapshot>,
}

/// Open subscriptions of one store. Callers must publish under the store's write
/// serialization so every watcher sees snapshots in commit order.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    watchers: Mutex<Vec<Watcher>>,
}

impl WatchRegistry {
    pub(crate) fn register(&self, path: StorePath) -> (mpsc::UnboundedSender<Snapshot>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(Watcher { path, tx: tx.clone() });
        (tx, Subscription { rx })
    }

    /// Distinct watched paths that a change at `changed` can affect. Drops closed watchers.
    pub(crate) fn affected(&self, changed: &StorePath) -> Vec<StorePath> {
        let mut watchers = self.watchers.lock();
        watchers.retain(|w| !w.tx.is_closed());
        let mut paths: Vec<StorePath> = Vec::new();
        for watcher in watchers.iter().filter(|w| w.path.overlaps(changed)) {
            if !paths.contains(&watcher.path) {
                paths.push(watcher.path.clone());
            }
        }
        paths
    }

    pub(crate) fn publish(&self, path: &StorePath, snapshot: &Snapshot) {
        for watcher in self.watchers.lock().iter().filter(|w| &w.path == path) {
            let _ = watcher.tx.send(snapshot.clone());
        }
    }

    pub(crate) fn clear(&self) { self.watchers.lock().clear(); }

    pub(crate) fn len(&self) -> usize {
        let mut watchers = self.watchers.lock();
        watchers.retain(|w| !w.tx.is_closed());
        watchers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_overlapping_watchers_only() {
        let registry = WatchRegistry::default();
        let (_, mut orders) = registry.register(StorePath::parse("orders").unwrap());
        let (_, mut products) = registry.register(StorePath::parse("products").unwrap());

        let changed = StorePath::parse("orders/o1").unwrap();
        let affected = registry.affected(&changed);
        assert_eq!(affected, vec![StorePath::parse("orders").unwrap()]);
        registry.publish(&affected[0], &Snapshot::new(Some(json!({ "o1": {} }))));

        assert!(orders.recv().await.unwrap().exists());
        assert!(products.rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let registry = WatchRegistry::default();
        let (tx, sub) = registry.register(StorePath::parse("orders").unwrap());
        drop(tx);
        assert_eq!(registry.len(), 1);
        drop(sub);
        assert_eq!(registry.len(), 0);
    }
}
