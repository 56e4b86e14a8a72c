//! Product impression queries

use super::{Entity, Repository};
use crate::domain::aggregates::ProductView;
use crate::Result;

impl Entity for ProductView {
    const COLLECTION: &'static str = "productViews";
    const CREATED_FIELDS: &'static [&'static str] = &["viewedAt"];

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    fn sort(items: &mut [Self]) { items.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at)); }
}

impl Repository<ProductView> {
    /// Appends one impression. Blank agent and referrer strings are not stored.
    pub async fn record_view(&self, product_id: &str, product_name: &str, user_agent: Option<&str>, referrer: Option<&str>) -> Result<String> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let view = ProductView {
            user_agent: present(user_agent),
            referrer: present(referrer),
            ..ProductView::new(product_id, product_name)
        };
        self.add(&view).await
    }

    pub async fn for_product(&self, product_id: &str) -> Vec<ProductView> {
        let product_id = product_id.to_string();
        self.get_where(move |v| v.product_id == product_id).await
    }
}
