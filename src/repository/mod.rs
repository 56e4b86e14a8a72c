//! Entity repositories
//!
//! One generic [`Repository`] per entity kind over an injected [`DocumentStore`].
//! Records live as a flat map keyed by store-generated id under the entity's
//! collection; reads turn that map into an ordered `Vec` of records with ids.
//!
//! Read paths never fail on an unreachable store: one-shot reads return `[]` and
//! live queries yield `[]` once. Write paths always propagate the failure.

mod live;
mod messages;
mod orders;
mod products;
mod taxonomy;
mod views;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::store::{clean_map, resolve_server_values, server_timestamp, DocumentStore, Snapshot, StorePath};
use crate::{Result, StorefrontError};

pub use live::{LiveCollection, SubscriptionHandle};
use live::Filter;

/// A record kind stored as one collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Fields stamped with server time when the record is created.
    const CREATED_FIELDS: &'static [&'static str] = &["createdAt"];
    /// Fields stamped with server time on creation and on every update.
    const UPDATED_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// Normalizes a record about to be created.
    fn prepare_new(&mut self) {}

    fn validate(&self) -> Result<()> { Ok(()) }

    /// Fills derived fields on records read back from the store.
    fn hydrate(&mut self) {}

    /// Orders a materialized collection. Store iteration order is kept by default.
    fn sort(_items: &mut [Self]) {}
}

/// Decodes every child of a collection snapshot, skipping records that no longer parse.
pub(crate) fn materialize<E: Entity>(snapshot: &Snapshot, filter: Option<&Filter<E>>) -> Vec<E> {
    let mut items: Vec<E> = snapshot
        .children()
        .filter_map(|(id, value)| match serde_json::from_value::<E>(value.clone()) {
            Ok(mut record) => {
                record.set_id(id.to_string());
                record.hydrate();
                Some(record)
            }
            Err(err) => {
                tracing::warn!(collection = E::COLLECTION, id, "skipping undecodable record: {}", err);
                None
            }
        })
        .filter(|record| filter.map_or(true, |f| f(record)))
        .collect();
    E::sort(&mut items);
    items
}

fn to_object<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StorefrontError::WriteRejected(format!("expected an object payload, got {other}"))),
    }
}

fn stamp(payload: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        payload.insert((*field).to_string(), server_timestamp());
    }
}

pub struct Repository<E> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self { Self { store: self.store.clone(), _entity: PhantomData } }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store, _entity: PhantomData } }

    fn collection() -> StorePath {
        StorePath::parse(E::COLLECTION).unwrap_or_default()
    }

    fn record_path(id: &str) -> Result<StorePath> {
        Ok(Self::collection().child(id)?)
    }

    /// One-shot read of the whole collection. `[]` when the store is unreachable.
    pub async fn get_all(&self) -> Vec<E> {
        match self.store.read(&Self::collection()).await {
            Ok(snapshot) => materialize(&snapshot, None),
            Err(err) => {
                tracing::warn!(collection = E::COLLECTION, "read degraded to empty collection: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn get_where<F>(&self, predicate: F) -> Vec<E>
    where
        F: Fn(&E) -> bool,
    {
        let mut items = self.get_all().await;
        items.retain(|record| predicate(record));
        items
    }

    /// Reads a single record. Unlike collection reads this propagates store failures,
    /// since callers use it to decide whether a write may proceed.
    pub async fn get(&self, id: &str) -> Result<Option<E>> {
        let snapshot = self.store.read(&Self::record_path(id)?).await?;
        let Some(value) = snapshot.into_value() else { return Ok(None) };
        let mut record: E = serde_json::from_value(value)?;
        record.set_id(id.to_string());
        record.hydrate();
        Ok(Some(record))
    }

    /// Creates a record and returns its store-assigned id. Timestamps are server time.
    pub async fn add(&self, record: &E) -> Result<String> {
        let mut record = record.clone();
        record.prepare_new();
        record.validate()?;

        let mut payload = clean_map(to_object(&record)?);
        stamp(&mut payload, E::CREATED_FIELDS);
        stamp(&mut payload, E::UPDATED_FIELDS);

        let id = self.store.push(&Self::collection(), Value::Object(payload)).await?;
        tracing::debug!(collection = E::COLLECTION, id = %id, "record added");
        Ok(id)
    }

    /// Merges the non-`None` fields of `patch` into an existing record. The merged
    /// record must still pass [`Entity::validate`]; a missing id is `NotFound`.
    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Result<()> {
        let partial = clean_map(to_object(patch)?);
        self.patch_existing(id, partial).await?;
        tracing::debug!(collection = E::COLLECTION, id, "record updated");
        Ok(())
    }

    /// Deletes the listed fields from an existing record.
    pub async fn clear_fields(&self, id: &str, fields: &[&str]) -> Result<()> {
        let partial: Map<String, Value> = fields.iter().map(|f| ((*f).to_string(), Value::Null)).collect();
        self.patch_existing(id, partial).await?;
        tracing::debug!(collection = E::COLLECTION, id, ?fields, "record fields cleared");
        Ok(())
    }

    /// Checks the merged record before writing the partial. The read and the write are
    /// not atomic: a delete landing between them still leaves the partial behind.
    async fn patch_existing(&self, id: &str, mut partial: Map<String, Value>) -> Result<()> {
        let path = Self::record_path(id)?;
        let Some(Value::Object(mut merged)) = self.store.read(&path).await?.into_value() else {
            return Err(StorefrontError::NotFound { collection: E::COLLECTION, id: id.to_string() });
        };
        for (key, value) in &partial {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        let mut merged = Value::Object(merged);
        resolve_server_values(&mut merged, chrono::Utc::now().timestamp_millis());
        let mut record: E = serde_json::from_value(merged)?;
        record.set_id(id.to_string());
        record.hydrate();
        record.validate()?;

        stamp(&mut partial, E::UPDATED_FIELDS);
        self.store.patch(&path, partial).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.remove(&Self::record_path(id)?).await?;
        tracing::debug!(collection = E::COLLECTION, id, "record deleted");
        Ok(())
    }

    pub fn watch(&self) -> LiveCollection<E> { self.live(None) }

    pub fn watch_where<F>(&self, predicate: F) -> LiveCollection<E>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.live(Some(Arc::new(predicate)))
    }

    /// Calls `callback` with the current collection now and after every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<E>) + Send + 'static,
    {
        self.watch().spawn(callback)
    }

    fn live(&self, filter: Option<Filter<E>>) -> LiveCollection<E> {
        match self.store.subscribe(&Self::collection()) {
            Ok(subscription) => LiveCollection::online(subscription, filter),
            Err(err) => {
                tracing::warn!(collection = E::COLLECTION, "live query offline: {}", err);
                LiveCollection::offline()
            }
        }
    }
}
