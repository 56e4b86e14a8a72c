//! SQLite-backed document store.
//!
//! Each depth-two path (`collection/key`) is one row holding the document as JSON
//! text. Deeper paths are read-modify-write on that row inside a transaction;
//! collection paths act on every row of the collection. The root is not addressable.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{new_push_id, prepare_patch, prepare_write, tree, Clock, DocumentStore, Mutation, Snapshot, StoreError, StorePath, Subscription, WatchRegistry};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable,
            other => {
                tracing::error!("sqlite store error: {:?}", other);
                StoreError::WriteRejected(other.to_string())
            }
        }
    }
}

enum Target<'a> {
    Collection(&'a str),
    Document { collection: &'a str, key: &'a str, rest: &'a [String] },
}

fn target(path: &StorePath) -> Result<Target<'_>, StoreError> {
    match path.segments() {
        [] => Err(StoreError::InvalidPath("the root of a sqlite store is not addressable".into())),
        [collection] => Ok(Target::Collection(collection.as_str())),
        [collection, key, rest @ ..] => Ok(Target::Document { collection: collection.as_str(), key: key.as_str(), rest }),
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    watchers: Arc<WatchRegistry>,
    write_lock: Arc<Mutex<()>>,
    clock: Clock,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and prepares the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                tracing::error!("invalid sqlite url {}: {}", url, e);
                StoreError::Unavailable
            })?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));
        if !url.contains(":memory:") {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if url.contains(":memory:") {
            // every connection to :memory: is a separate database, so the one connection must live forever
            pool_options = pool_options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await.map_err(|e| {
            tracing::error!("sqlite connect failed: {}", e);
            StoreError::Unavailable
        })?;
        run_migrations(&pool).await?;
        tracing::info!("sqlite store connected");

        Ok(Self {
            pool,
            watchers: Arc::new(WatchRegistry::default()),
            write_lock: Arc::new(Mutex::new(())),
            clock: Arc::new(|| Utc::now().timestamp_millis()),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn apply(&self, path: &StorePath, mutation: Mutation) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        match target(path)? {
            Target::Collection(collection) => {
                let mut node = Value::Object(load_collection(&mut tx, collection).await?);
                mutation.apply(&mut node, &[]);
                let documents = match node {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    _ => return Err(StoreError::WriteRejected(format!("/{path} holds documents, not a scalar"))),
                };
                sqlx::query("DELETE FROM documents WHERE collection = ?").bind(collection).execute(&mut *tx).await?;
                for (key, body) in &documents {
                    save_document(&mut tx, collection, key, body).await?;
                }
            }
            Target::Document { collection, key, rest } => {
                let mut doc = load_document(&mut tx, collection, key).await?.unwrap_or(Value::Null);
                mutation.apply(&mut doc, rest);
                if doc.is_null() {
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND key = ?").bind(collection).bind(key).execute(&mut *tx).await?;
                } else {
                    save_document(&mut tx, collection, key, &doc).await?;
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(path = %path, "sqlite store mutated");

        for watched in self.watchers.affected(path) {
            match read_snapshot(&self.pool, &watched).await {
                Ok(snapshot) => self.watchers.publish(&watched, &snapshot),
                Err(err) => tracing::warn!(path = %watched, "could not refresh subscription: {}", err),
            }
        }
        Ok(())
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn parse_body(body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::WriteRejected(format!("corrupt document: {e}")))
}

async fn load_document(conn: &mut SqliteConnection, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
    let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND key = ?")
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| parse_body(row.get::<&str, _>("body"))).transpose()
}

async fn load_collection(conn: &mut SqliteConnection, collection: &str) -> Result<Map<String, Value>, StoreError> {
    let rows = sqlx::query("SELECT key, body FROM documents WHERE collection = ? ORDER BY key")
        .bind(collection)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(|row| Ok((row.get::<String, _>("key"), parse_body(row.get::<&str, _>("body"))?))).collect()
}

async fn save_document(conn: &mut SqliteConnection, collection: &str, key: &str, body: &Value) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO documents (collection, key, body) VALUES (?, ?, ?) ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body")
        .bind(collection)
        .bind(key)
        .bind(body.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn read_snapshot(pool: &SqlitePool, path: &StorePath) -> Result<Snapshot, StoreError> {
    let mut conn = pool.acquire().await?;
    let value = match target(path)? {
        Target::Collection(collection) => {
            let documents = load_collection(&mut conn, collection).await?;
            (!documents.is_empty()).then_some(Value::Object(documents))
        }
        Target::Document { collection, key, rest } => {
            load_document(&mut conn, collection, key).await?.and_then(|doc| tree::get(&doc, rest).cloned())
        }
    };
    Ok(Snapshot::new(value))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        read_snapshot(&self.pool, path).await
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let id = new_push_id();
        let child = path.child(&id)?;
        let value = prepare_write(value, &child, (self.clock)())?;
        self.apply(&child, Mutation::Set(value)).await?;
        Ok(id)
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let value = prepare_write(value, path, (self.clock)())?;
        self.apply(path, Mutation::Set(value)).await
    }

    async fn patch(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        let partial = prepare_patch(partial, path, (self.clock)())?;
        self.apply(path, Mutation::Merge(partial)).await
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.apply(path, Mutation::Remove).await
    }

    /// Must be called inside a tokio runtime: the initial snapshot is loaded on a spawned task.
    fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Unavailable);
        }
        target(path)?;
        let (tx, subscription) = self.watchers.register(path.clone());
        let (pool, write_lock, path) = (self.pool.clone(), self.write_lock.clone(), path.clone());
        tokio::spawn(async move {
            // Holding the write lock keeps the initial snapshot ordered with change notifications.
            let _guard = write_lock.lock().await;
            match read_snapshot(&pool, &path).await {
                Ok(snapshot) => {
                    let _ = tx.send(snapshot);
                }
                Err(err) => tracing::warn!(path = %path, "initial snapshot failed: {}", err),
            }
        });
        Ok(subscription)
    }

    async fn close(&self) {
        self.watchers.clear();
        self.pool.close().await;
        tracing::info!("sqlite store closed");
    }
}
