//! Storefront facade

use std::sync::Arc;

use crate::domain::aggregates::{Category, ChatMessage, Order, Product, ProductView, Subcategory};
use crate::lifecycle::OrderLifecycle;
use crate::repository::Repository;
use crate::store::{DocumentStore, MemoryStore, SqliteStore};
use crate::{Config, Result};

/// One explicitly constructed store shared by every repository.
#[derive(Clone)]
pub struct Storefront {
    store: Arc<dyn DocumentStore>,
    pub products: Repository<Product>,
    pub categories: Repository<Category>,
    pub subcategories: Repository<Subcategory>,
    pub messages: Repository<ChatMessage>,
    pub orders: Repository<Order>,
    pub views: Repository<ProductView>,
    pub lifecycle: OrderLifecycle,
}

impl Storefront {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let orders = Repository::new(store.clone());
        Self {
            products: Repository::new(store.clone()),
            categories: Repository::new(store.clone()),
            subcategories: Repository::new(store.clone()),
            messages: Repository::new(store.clone()),
            views: Repository::new(store.clone()),
            lifecycle: OrderLifecycle::new(orders.clone()),
            orders,
            store,
        }
    }

    /// Opens the sqlite store named in `config`, or an in-memory store when none is set.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match &config.store_url {
            Some(url) => Arc::new(SqliteStore::connect(url, config.max_connections).await?),
            None => {
                tracing::warn!("no STOREFRONT_STORE_URL set, data lives in memory only");
                Arc::new(MemoryStore::connect())
            }
        };
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> { &self.store }

    pub async fn close(&self) {
        self.store.close().await;
        tracing::info!("storefront store closed");
    }
}
