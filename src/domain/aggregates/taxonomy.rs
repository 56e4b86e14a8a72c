//! Category and Subcategory

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::generate_slug;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub created_at: i64,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}

/// Holds a plain back-reference to its category. Deleting the category leaves it in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subcategory {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub category_id: String,
    pub created_at: i64,
}

impl Subcategory {
    pub fn new(name: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self { name: name.into(), category_id: category_id.into(), ..Default::default() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubcategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub category_id: Option<String>,
}

pub(crate) fn fill_slug(slug: &mut String, name: &str) {
    if slug.trim().is_empty() {
        *slug = generate_slug(name);
    }
}
