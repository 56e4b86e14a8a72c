//! In-process document store

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{new_push_id, prepare_patch, prepare_write, tree, DocumentStore, Mutation, Snapshot, StoreError, StorePath, Subscription, WatchRegistry};

/// Source of server time in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

struct MemoryState {
    root: Value,
    connected: bool,
}

/// JSON tree held in memory. Used as the store for single-process deployments and
/// as the substitute store in tests.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    watchers: WatchRegistry,
    clock: Clock,
}

impl MemoryStore {
    pub fn connect() -> Self {
        Self::with_clock(Arc::new(|| Utc::now().timestamp_millis()))
    }

    pub fn with_clock(clock: Clock) -> Self {
        tracing::debug!("memory store connected");
        Self { state: Mutex::new(MemoryState { root: Value::Null, connected: true }), watchers: WatchRegistry::default(), clock }
    }

    pub fn is_connected(&self) -> bool { self.state.lock().connected }

    pub fn subscriber_count(&self) -> usize { self.watchers.len() }

    fn apply(&self, path: &StorePath, mutation: Mutation) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(StoreError::Unavailable);
        }
        mutation.apply(&mut state.root, path.segments());
        tracing::debug!(path = %path, "memory store mutated");
        for watched in self.watchers.affected(path) {
            let snapshot = Snapshot::new(tree::get(&state.root, watched.segments()).cloned());
            self.watchers.publish(&watched, &snapshot);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        let state = self.state.lock();
        if !state.connected {
            return Err(StoreError::Unavailable);
        }
        Ok(Snapshot::new(tree::get(&state.root, path.segments()).cloned()))
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let id = new_push_id();
        let child = path.child(&id)?;
        let value = prepare_write(value, &child, (self.clock)())?;
        self.apply(&child, Mutation::Set(value))?;
        Ok(id)
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let value = prepare_write(value, path, (self.clock)())?;
        self.apply(path, Mutation::Set(value))
    }

    async fn patch(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        let partial = prepare_patch(partial, path, (self.clock)())?;
        self.apply(path, Mutation::Merge(partial))
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.apply(path, Mutation::Remove)
    }

    fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        let state = self.state.lock();
        if !state.connected {
            return Err(StoreError::Unavailable);
        }
        let (tx, subscription) = self.watchers.register(path.clone());
        let _ = tx.send(Snapshot::new(tree::get(&state.root, path.segments()).cloned()));
        Ok(subscription)
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        self.watchers.clear();
        tracing::debug!("memory store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn fixed_clock(start: i64) -> Clock {
        let now = Arc::new(AtomicI64::new(start));
        Arc::new(move || now.fetch_add(1, Ordering::SeqCst))
    }

    fn path(p: &str) -> StorePath { StorePath::parse(p).unwrap() }

    #[tokio::test]
    async fn test_push_then_read() {
        let store = MemoryStore::connect();
        let id = store.push(&path("products"), json!({ "name": "Šator" })).await.unwrap();
        let snapshot = store.read(&path("products")).await.unwrap();
        let children: Vec<_> = snapshot.children().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, id);
        assert_eq!(children[0].1["name"], "Šator");
    }

    #[tokio::test]
    async fn test_server_timestamp_uses_store_clock() {
        let store = MemoryStore::with_clock(fixed_clock(1_000));
        let id = store.push(&path("orders"), json!({ "createdAt": crate::store::server_timestamp() })).await.unwrap();
        let snapshot = store.read(&path(&format!("orders/{id}/createdAt"))).await.unwrap();
        assert_eq!(snapshot.value(), Some(&json!(1_000)));
    }

    #[tokio::test]
    async fn test_patch_merges() {
        let store = MemoryStore::connect();
        store.write(&path("orders/o1"), json!({ "status": "new", "seen": false })).await.unwrap();
        let mut partial = Map::new();
        partial.insert("seen".into(), json!(true));
        store.patch(&path("orders/o1"), partial).await.unwrap();
        let snapshot = store.read(&path("orders/o1")).await.unwrap();
        assert_eq!(snapshot.value(), Some(&json!({ "status": "new", "seen": true })));
    }

    #[tokio::test]
    async fn test_null_write_rejected_and_nothing_stored() {
        let store = MemoryStore::connect();
        let err = store.write(&path("orders/o1"), json!({ "note": null })).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteRejected(_)));
        assert!(!store.read(&path("orders/o1")).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_subscription_gets_initial_and_updates() {
        let store = MemoryStore::connect();
        let mut sub = store.subscribe(&path("orders")).unwrap();
        assert!(!sub.next().await.unwrap().exists());

        store.write(&path("orders/o1"), json!({ "status": "new" })).await.unwrap();
        store.write(&path("products/p1"), json!({ "name": "x" })).await.unwrap();
        store.remove(&path("orders/o1")).await.unwrap();

        assert_eq!(sub.next().await.unwrap().value(), Some(&json!({ "o1": { "status": "new" } })));
        assert_eq!(sub.next().await.unwrap().value(), Some(&json!({})));
    }

    #[tokio::test]
    async fn test_close_makes_store_unavailable() {
        let store = MemoryStore::connect();
        let mut sub = store.subscribe(&path("orders")).unwrap();
        let _ = sub.next().await;
        store.close().await;
        assert!(!store.is_connected());
        assert_eq!(store.read(&path("orders")).await.unwrap_err(), StoreError::Unavailable);
        assert_eq!(store.write(&path("orders/o1"), json!(1)).await.unwrap_err(), StoreError::Unavailable);
        assert!(store.subscribe(&path("orders")).is_err());
        assert!(sub.next().await.is_none());
    }
}
