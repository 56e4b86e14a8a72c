//! Product queries

use super::{Entity, Repository};
use crate::domain::aggregates::Product;
use crate::Result;

impl Entity for Product {
    const COLLECTION: &'static str = "products";
    const UPDATED_FIELDS: &'static [&'static str] = &["updatedAt"];

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn prepare_new(&mut self) { self.ensure_slugs(); }

    fn validate(&self) -> Result<()> { self.check() }

    /// Records written before slugs existed stay addressable.
    fn hydrate(&mut self) { self.ensure_slugs(); }
}

impl Repository<Product> {
    /// First product in collection order whose slug matches. Slugs are not unique.
    pub async fn get_by_slug(&self, slug: &str) -> Option<Product> {
        self.get_all().await.into_iter().find(|p| p.slug == slug)
    }

    pub async fn in_category(&self, category_slug: &str) -> Vec<Product> {
        let category_slug = category_slug.to_string();
        self.get_where(move |p| p.category_slug == category_slug).await
    }
}
