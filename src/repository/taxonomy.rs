//! Category and subcategory queries

use super::{Entity, Repository};
use crate::domain::aggregates::taxonomy::fill_slug;
use crate::domain::aggregates::{Category, Subcategory};

impl Entity for Category {
    const COLLECTION: &'static str = "categories";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn prepare_new(&mut self) { fill_slug(&mut self.slug, &self.name); }
}

impl Entity for Subcategory {
    const COLLECTION: &'static str = "subcategories";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn prepare_new(&mut self) { fill_slug(&mut self.slug, &self.name); }
}

impl Repository<Category> {
    pub async fn get_by_slug(&self, slug: &str) -> Option<Category> {
        self.get_all().await.into_iter().find(|c| c.slug == slug)
    }
}

impl Repository<Subcategory> {
    pub async fn subcategories_of(&self, category_id: &str) -> Vec<Subcategory> {
        let category_id = category_id.to_string();
        self.get_where(move |s| s.category_id == category_id).await
    }
}
