//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::order::within_amount;
use crate::domain::value_objects::{generate_slug, MediaKind};
use crate::{FieldError, FieldErrors, Result, StorefrontError};

pub const DEFAULT_STANDARD_LABEL: &str = "Standard";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    pub category_slug: String,
    pub subcategory_id: Option<String>,
    pub image: String,
    pub images: Option<Vec<String>>,
    pub video: Option<String>,
    pub description: String,
    pub rating: f64,
    pub review_count: u32,
    pub stock: Option<u32>,
    pub reviews: Option<Vec<Review>>,
    #[serde(deserialize_with = "lenient_badge")]
    pub badge: Option<Badge>,
    pub discount: Option<u8>,
    pub is_flash_sale: Option<bool>,
    pub sold_percent: Option<u8>,
    pub is_hero: Option<bool>,
    pub features: Option<Vec<String>>,
    pub variants: Option<Vec<ProductVariant>>,
    pub hide_standard_variant: Option<bool>,
    pub standard_variant_label: Option<String>,
    pub warranty: Option<String>,
    pub delivery_info: Option<String>,
    pub return_policy: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored variant row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductVariant {
    pub id: String,
    pub label: String,
    pub price: Decimal,
    pub stock: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub author: String,
    pub rating: u8,
    pub comment: String,
    pub date: Option<String>,
}

/// A purchasable option of a product.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    /// The product's own base price.
    Standard { label: String, price: Decimal },
    Custom { id: String, label: String, price: Decimal, stock: Option<u32> },
}

impl Variant {
    pub fn label(&self) -> &str {
        match self {
            Self::Standard { label, .. } | Self::Custom { label, .. } => label,
        }
    }

    pub fn price(&self) -> Decimal {
        match self {
            Self::Standard { price, .. } | Self::Custom { price, .. } => *price,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Standard { .. } => None,
            Self::Custom { id, .. } => Some(id.as_str()),
        }
    }

    pub fn is_standard(&self) -> bool { matches!(self, Self::Standard { .. }) }
}

impl From<&ProductVariant> for Variant {
    fn from(row: &ProductVariant) -> Self {
        Self::Custom { id: row.id.clone(), label: row.label.clone(), price: row.price, stock: row.stock }
    }
}

/// Promotional badge. Unknown stored values read back as no badge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    New,
    Sale,
    Hot,
    Bestseller,
    Limited,
}

impl Badge {
    pub const ALL: [Badge; 5] = [Badge::New, Badge::Sale, Badge::Hot, Badge::Bestseller, Badge::Limited];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Sale => "sale",
            Self::Hot => "hot",
            Self::Bestseller => "bestseller",
            Self::Limited => "limited",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Sale => "Sale",
            Self::Hot => "Hot",
            Self::Bestseller => "Bestseller",
            Self::Limited => "Limited",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|b| b.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

fn lenient_badge<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Badge>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Badge::parse))
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal, category: impl Into<String>) -> Self {
        let category = category.into();
        Self { name: name.into(), price, category_slug: generate_slug(&category), category, ..Default::default() }
    }

    pub fn custom_variants(&self) -> &[ProductVariant] { self.variants.as_deref().unwrap_or_default() }

    pub fn hides_standard_variant(&self) -> bool { self.hide_standard_variant.unwrap_or(false) }

    pub fn standard_variant(&self) -> Variant {
        let label = self
            .standard_variant_label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(DEFAULT_STANDARD_LABEL);
        Variant::Standard { label: label.to_string(), price: self.price }
    }

    /// Options in display order: the standard variant first unless hidden, then custom rows.
    /// A record that hides the standard variant but has no rows still offers the standard one.
    pub fn selectable_variants(&self) -> Vec<Variant> {
        let custom = self.custom_variants();
        let mut options = Vec::with_capacity(custom.len() + 1);
        if !self.hides_standard_variant() || custom.is_empty() {
            options.push(self.standard_variant());
        }
        options.extend(custom.iter().map(Variant::from));
        options
    }

    pub fn default_variant(&self) -> Variant {
        match self.custom_variants().first() {
            Some(first) if self.hides_standard_variant() => Variant::from(first),
            _ => self.standard_variant(),
        }
    }

    /// `None` selects the standard variant when it is offered.
    pub fn find_variant(&self, id: Option<&str>) -> Option<Variant> {
        match id {
            None => self.selectable_variants().into_iter().find(Variant::is_standard),
            Some(id) => self.custom_variants().iter().find(|v| v.id == id).map(Variant::from),
        }
    }

    /// Label recorded on an order line. Products without variants record none.
    pub fn order_label(&self, variant: &Variant) -> Option<String> {
        if self.custom_variants().is_empty() { None } else { Some(variant.label().to_string()) }
    }

    pub fn is_in_stock(&self) -> bool { self.stock.map_or(true, |s| s > 0) }

    pub fn has_renderable_image(&self) -> bool { MediaKind::is_renderable_image(&self.image) }

    /// Fills `slug` and `category_slug` from their names when absent.
    pub fn ensure_slugs(&mut self) {
        if self.slug.trim().is_empty() {
            self.slug = generate_slug(&self.name);
        }
        if self.category_slug.trim().is_empty() && !self.category.is_empty() {
            self.category_slug = generate_slug(&self.category);
        }
    }

    pub fn check(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(field_error("name", "required", "Product name is required"));
        }
        if !within_amount(self.price) {
            errors.push(field_error("price", "range", "Price is out of range"));
        }
        if self.custom_variants().iter().any(|v| !within_amount(v.price)) {
            errors.push(field_error("variants", "range", "Variant price is out of range"));
        } else if self.hides_standard_variant() && self.custom_variants().is_empty() {
            errors.push(field_error("variants", "required", "At least one variant is required when the standard option is hidden"));
        }
        if errors.is_empty() { Ok(()) } else { Err(StorefrontError::Validation(FieldErrors(errors))) }
    }
}

fn field_error(field: &str, code: &str, message: &str) -> FieldError {
    FieldError { field: field.to_string(), code: code.to_string(), message: message.to_string() }
}

/// Partial product update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub category: Option<String>,
    pub category_slug: Option<String>,
    pub subcategory_id: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub video: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub stock: Option<u32>,
    pub reviews: Option<Vec<Review>>,
    pub badge: Option<Badge>,
    pub discount: Option<u8>,
    pub is_flash_sale: Option<bool>,
    pub sold_percent: Option<u8>,
    pub is_hero: Option<bool>,
    pub features: Option<Vec<String>>,
    pub variants: Option<Vec<ProductVariant>>,
    pub hide_standard_variant: Option<bool>,
    pub standard_variant_label: Option<String>,
    pub warranty: Option<String>,
    pub delivery_info: Option<String>,
    pub return_policy: Option<String>,
}
