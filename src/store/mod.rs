//! Document store client
//!
//! A hierarchical JSON key-value store with four write primitives and
//! push-based subscriptions. Repositories only ever see the [`DocumentStore`]
//! trait; the concrete client is constructed by the caller and injected.
//!
//! Write rules shared by every backend:
//! - keys are non-empty and contain none of `. $ # [ ] /`
//! - written values contain no `null` (a `null` at the top level of a patch deletes that key)
//! - `{".sv": "timestamp"}` anywhere in a written value becomes the store clock in epoch millis

mod memory;
mod sqlite;
mod tree;
mod watch;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use memory::{Clock, MemoryStore};
pub use sqlite::SqliteStore;
pub use watch::Subscription;

pub(crate) use tree::Mutation;
pub(crate) use watch::WatchRegistry;

const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];
const SERVER_VALUE_KEY: &str = ".sv";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,
    #[error("{0}")]
    WriteRejected(String),
    #[error("{0}")]
    InvalidPath(String),
}

/// Location of a node in the store, e.g. `orders/0190f3c2...`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn root() -> Self { Self(Vec::new()) }

    pub fn parse(path: &str) -> Result<Self, StoreError> {
        path.split('/').filter(|s| !s.is_empty()).try_fold(Self::root(), |acc, segment| acc.child(segment))
    }

    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidPath(format!("illegal key {key:?} under /{self}")));
        }
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] { &self.0 }
    pub fn is_root(&self) -> bool { self.0.is_empty() }

    /// True when one path is an ancestor of (or equal to) the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        let shared = self.0.len().min(other.0.len());
        self.0[..shared] == other.0[..shared]
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0.join("/")) }
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(FORBIDDEN_KEY_CHARS)
}

/// Full value at a path at one point in time. `None` when nothing is stored there.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(value: Option<Value>) -> Self { Self { value } }
    pub fn exists(&self) -> bool { self.value.is_some() }
    pub fn value(&self) -> Option<&Value> { self.value.as_ref() }
    pub fn into_value(self) -> Option<Value> { self.value }

    /// Key/value pairs of an object node, in store iteration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.value
            .as_ref()
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError>;

    /// Stores `value` under a new store-generated child key of `path` and returns that key.
    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError>;

    /// Replaces whatever is at `path`.
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Overwrites only the listed keys of the object at `path`.
    async fn patch(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Registers a listener without suspending. The current snapshot is the first
    /// item delivered, followed by one snapshot per change under or above `path`.
    fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;

    async fn close(&self);
}

/// Placeholder resolved to the store clock on write.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_VALUE_KEY.to_string(), Value::from("timestamp"));
    Value::Object(sentinel)
}

/// Recursively drops `null` object members and array elements.
pub fn clean_payload(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(clean_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().filter(|v| !v.is_null()).map(clean_payload).collect()),
        other => other,
    }
}

pub fn clean_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().filter(|(_, v)| !v.is_null()).map(|(k, v)| (k, clean_payload(v))).collect()
}

pub(crate) fn new_push_id() -> String {
    Uuid::now_v7().simple().to_string()
}

fn is_server_timestamp(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some("timestamp")
}

pub(crate) fn resolve_server_values(value: &mut Value, now_ms: i64) {
    if value.as_object().is_some_and(is_server_timestamp) {
        *value = Value::from(now_ms);
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| resolve_server_values(v, now_ms)),
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_server_values(v, now_ms)),
        _ => {}
    }
}

fn validate_value(value: &Value, at: &str) -> Result<(), StoreError> {
    match value {
        Value::Null => Err(StoreError::WriteRejected(format!("null value at {at}"))),
        Value::Object(map) => map.iter().try_for_each(|(k, v)| {
            if !is_valid_key(k) {
                return Err(StoreError::WriteRejected(format!("illegal key {k:?} at {at}")));
            }
            validate_value(v, &format!("{at}/{k}"))
        }),
        Value::Array(items) => items.iter().enumerate().try_for_each(|(i, v)| validate_value(v, &format!("{at}/{i}"))),
        _ => Ok(()),
    }
}

pub(crate) fn prepare_write(mut value: Value, path: &StorePath, now_ms: i64) -> Result<Value, StoreError> {
    resolve_server_values(&mut value, now_ms);
    validate_value(&value, &format!("/{path}"))?;
    Ok(value)
}

pub(crate) fn prepare_patch(mut partial: Map<String, Value>, path: &StorePath, now_ms: i64) -> Result<Map<String, Value>, StoreError> {
    partial.values_mut().for_each(|v| resolve_server_values(v, now_ms));
    for (k, v) in &partial {
        if !is_valid_key(k) {
            return Err(StoreError::WriteRejected(format!("illegal key {k:?} at /{path}")));
        }
        if !v.is_null() {
            validate_value(v, &format!("/{path}/{k}"))?;
        }
    }
    Ok(partial)
}
