//! Product impressions

use serde::{Deserialize, Serialize};

/// Append-only record of one product page view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductView {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub viewed_at: i64,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ProductView {
    pub fn new(product_id: impl Into<String>, product_name: impl Into<String>) -> Self {
        Self { product_id: product_id.into(), product_name: product_name.into(), ..Default::default() }
    }
}
