//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{OrderItem, Product, Variant};
use crate::identity::LocalStorage;
use crate::Result;

pub const CART_KEY: &str = "cart";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal { self.unit_price.saturating_mul(Decimal::from(self.quantity)) }

    fn matches(&self, product_id: &str, variant: Option<&str>) -> bool {
        self.product_id == product_id && self.variant.as_deref() == variant
    }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Reads the persisted cart. A missing or unreadable entry yields an empty cart.
    pub fn load(storage: &dyn LocalStorage) -> Result<Self> {
        let Some(raw) = storage.get(CART_KEY)? else { return Ok(Self::new()) };
        match serde_json::from_str(&raw) {
            Ok(cart) => Ok(cart),
            Err(err) => {
                tracing::warn!("discarding unreadable cart: {}", err);
                Ok(Self::new())
            }
        }
    }

    pub fn save(&self, storage: &dyn LocalStorage) -> Result<()> {
        storage.set(CART_KEY, &serde_json::to_string(self)?)
    }

    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).fold(0, u32::saturating_add) }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total(&self) -> Decimal { self.items.iter().map(CartLine::line_total).fold(Decimal::ZERO, Decimal::saturating_add) }

    /// Adds `quantity` of `product` in `variant`, snapshotting name, image and price now.
    pub fn add(&mut self, product: &Product, variant: &Variant, quantity: u32) -> std::result::Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let label = product.order_label(variant);
        if let Some(existing) = self.items.iter_mut().find(|i| i.matches(&product.id, label.as_deref())) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            existing.unit_price = variant.price();
        } else {
            self.items.push(CartLine {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                product_image: product.image.clone(),
                variant: label,
                unit_price: variant.price(),
                quantity,
            });
        }
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, variant: Option<&str>, quantity: u32) -> std::result::Result<(), CartError> {
        let line = self.items.iter_mut().find(|i| i.matches(product_id, variant)).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 {
            self.items.retain(|i| !i.matches(product_id, variant));
        } else {
            line.quantity = quantity;
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str, variant: Option<&str>) -> std::result::Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| !i.matches(product_id, variant));
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); }

    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.items
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                product_image: line.product_image.clone(),
                price: line.unit_price,
                quantity: line.quantity,
                variant: line.variant.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError { ItemNotFound, InvalidQuantity }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "Item not found"),
            Self::InvalidQuantity => write!(f, "Quantity must be at least 1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ProductVariant;
    use crate::identity::MemoryStorage;

    fn tent() -> Product {
        let mut product = Product::new("Šator", Decimal::from(100), "Kamp");
        product.id = "p1".into();
        product.variants = Some(vec![ProductVariant { id: "v2".into(), label: "Za dvoje".into(), price: Decimal::from(140), stock: None }]);
        product
    }

    #[test]
    fn test_cart_merges_same_variant() {
        let product = tent();
        let mut cart = Cart::new();
        cart.add(&product, &product.default_variant(), 2).unwrap();
        cart.add(&product, &product.default_variant(), 1).unwrap();
        cart.add(&product, &product.find_variant(Some("v2")).unwrap(), 1).unwrap();
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].variant.as_deref(), Some("Standard"));
        assert_eq!(cart.total(), Decimal::from(440));
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let product = tent();
        let mut cart = Cart::new();
        cart.add(&product, &product.default_variant(), 2).unwrap();
        cart.update_quantity("p1", Some("Standard"), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.update_quantity("p1", None, 1), Err(CartError::ItemNotFound));
        assert_eq!(cart.add(&product, &product.default_variant(), 0), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_order_items_are_snapshots() {
        let mut product = tent();
        let mut cart = Cart::new();
        cart.add(&product, &product.default_variant(), 1).unwrap();
        product.price = Decimal::from(120);
        let items = cart.to_order_items();
        assert_eq!(items[0].price, Decimal::from(100));
        assert_eq!(items[0].product_name, "Šator");
    }

    #[test]
    fn test_cart_persists() {
        let storage = MemoryStorage::default();
        let product = tent();
        let mut cart = Cart::load(&storage).unwrap();
        cart.add(&product, &product.default_variant(), 2).unwrap();
        cart.save(&storage).unwrap();
        assert_eq!(Cart::load(&storage).unwrap(), cart);

        storage.set(CART_KEY, "not json").unwrap();
        assert!(Cart::load(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_quantities_saturate() {
        let product = tent();
        let mut cart = Cart::new();
        cart.add(&product, &product.default_variant(), u32::MAX).unwrap();
        cart.add(&product, &product.default_variant(), 5).unwrap();
        cart.add(&product, &product.find_variant(Some("v2")).unwrap(), u32::MAX).unwrap();
        assert_eq!(cart.items()[0].quantity, u32::MAX);
        assert_eq!(cart.item_count(), u32::MAX);
        assert_eq!(cart.total(), Decimal::from(240) * Decimal::from(u32::MAX));
    }
}
