//! Storefront Sync
//!
//! Catalog and order store for a small storefront whose clients read, write and
//! subscribe to a shared document store without a server-side transaction layer.
//!
//! ## Features
//! - Live entity repositories over an injected document store
//! - Guest and account order identity
//! - Order status state machine with customer cancellation
//! - Sales and product-view analytics

pub mod analytics;
pub mod config;
pub mod domain;
pub mod identity;
pub mod lifecycle;
pub mod repository;
pub mod store;
pub mod storefront;

use std::fmt;
use thiserror::Error;

use crate::domain::aggregates::OrderStatus;
use crate::store::StoreError;

pub use crate::config::Config;
pub use crate::lifecycle::{Actor, OrderLifecycle};
pub use crate::repository::{LiveCollection, Repository, SubscriptionHandle};
pub use crate::store::{DocumentStore, MemoryStore, SqliteStore};
pub use crate::storefront::Storefront;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Document store unavailable")]
    StoreUnavailable,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Local storage error: {0}")]
    LocalStorage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for StorefrontError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => Self::StoreUnavailable,
            StoreError::WriteRejected(reason) => Self::WriteRejected(reason),
            StoreError::InvalidPath(path) => Self::InvalidPath(path),
        }
    }
}

impl StorefrontError {
    pub(crate) fn invalid_field(field: &str, code: &str, message: &str) -> Self {
        Self::Validation(FieldErrors(vec![FieldError { field: field.to_string(), code: code.to_string(), message: message.to_string() }]))
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

/// A single failed check on caller-supplied data.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Per-field failures, sorted by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn fields(&self) -> impl Iterator<Item = &str> { self.0.iter().map(|e| e.field.as_str()) }
    pub fn contains(&self, field: &str) -> bool { self.0.iter().any(|e| e.field == field) }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    code: e.code.to_string(),
                    message: e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        out.sort_by(|a, b| a.field.cmp(&b.field));
        Self(out)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join(", "))
    }
}
