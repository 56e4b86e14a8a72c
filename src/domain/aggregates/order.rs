//! Order Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::domain::value_objects::{email_shape, not_blank, phone_shape};
use crate::{FieldErrors, Result, StorefrontError};

/// Who is asking for a status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Admin,
    Customer,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    New,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::New, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(value))
    }

    /// Past these a customer can no longer act on the order.
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Admins may move an order anywhere. Customers may only cancel a new order.
    pub fn can_transition(self, to: OrderStatus, actor: Actor) -> bool {
        match actor {
            Actor::Admin => true,
            Actor::Customer => self == Self::New && to == Self::Cancelled,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

/// A line snapshot taken at checkout. Later catalog edits never reach it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price.saturating_mul(Decimal::from(self.quantity)) }
}

/// Largest price or order total accepted at checkout.
pub fn max_amount() -> Decimal { Decimal::from(1_000_000_000_000_u64) }

/// Non-negative and no larger than [`max_amount`].
pub fn within_amount(amount: Decimal) -> bool { !amount.is_sign_negative() && amount <= max_amount() }

/// Exactly one identity per order, stored as either `userId` or `guestDeviceId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderOwner {
    #[serde(rename = "userId")]
    User(String),
    #[serde(rename = "guestDeviceId")]
    Guest(String),
}

impl OrderOwner {
    pub fn from_ids(user_id: Option<&str>, guest_device_id: Option<&str>) -> Result<Self> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        match (present(user_id), present(guest_device_id)) {
            (Some(user), None) => Ok(Self::User(user)),
            (None, Some(guest)) => Ok(Self::Guest(guest)),
            (Some(_), Some(_)) => Err(StorefrontError::invalid_field("owner", "exclusive", "Set either userId or guestDeviceId, not both")),
            (None, None) => Err(StorefrontError::invalid_field("owner", "required", "An order needs a userId or a guestDeviceId")),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id.as_str()),
            Self::Guest(_) => None,
        }
    }

    pub fn guest_device_id(&self) -> Option<&str> {
        match self {
            Self::Guest(id) => Some(id.as_str()),
            Self::User(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub customer_address: String,
    #[serde(default)]
    pub customer_city: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub tracking_note: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(flatten)]
    pub owner: OrderOwner,
}

impl Order {
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).fold(0, u32::saturating_add) }

    pub fn items_total(&self) -> Decimal { self.items.iter().map(OrderItem::line_total).fold(Decimal::ZERO, Decimal::saturating_add) }

    pub fn needs_attention(&self) -> bool { self.status == OrderStatus::New && !self.seen }

    /// Fails with `InvalidTransition` when `actor` may not move this order to `to`.
    pub fn check_transition(&self, actor: Actor, to: OrderStatus) -> Result<()> {
        if self.status.can_transition(to, actor) {
            Ok(())
        } else {
            Err(StorefrontError::InvalidTransition { from: self.status, to })
        }
    }
}

/// Contact and delivery details entered at checkout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "email_shape")]
    pub email: String,
    #[validate(custom = "phone_shape")]
    pub phone: String,
    #[validate(custom = "not_blank")]
    pub address: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl CheckoutForm {
    pub fn prefilled(profile: &UserProfile, email: &str) -> Self {
        Self {
            name: profile.display_name.clone().unwrap_or_default(),
            email: email.to_string(),
            phone: profile.phone.clone().unwrap_or_default(),
            address: profile.address.clone().unwrap_or_default(),
            city: profile.city.clone().unwrap_or_default(),
            note: None,
        }
    }

    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|errors| StorefrontError::Validation(FieldErrors::from(errors)))
    }
}

/// Profile fields supplied by the authentication collaborator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Everything a caller supplies to place an order. Status and `seen` are not
/// part of it: placement always starts at `new`, unseen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub owner: OrderOwner,
    pub checkout: CheckoutForm,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
}

impl OrderDraft {
    pub fn new(owner: OrderOwner, checkout: CheckoutForm, items: Vec<OrderItem>) -> Self {
        let total_price = items.iter().map(OrderItem::line_total).fold(Decimal::ZERO, Decimal::saturating_add);
        Self { owner, checkout, items, total_price }
    }

    /// Validates the form and the item list together so every failing field is reported at once.
    pub fn check(&self) -> Result<()> {
        let mut errors = match self.checkout.validate() {
            Ok(()) => FieldErrors::default(),
            Err(errors) => FieldErrors::from(errors),
        };
        let owner_id = self.owner.user_id().or(self.owner.guest_device_id()).unwrap_or_default();
        if owner_id.trim().is_empty() {
            errors.0.push(crate::FieldError { field: "owner".into(), code: "required".into(), message: "An order needs a userId or a guestDeviceId".into() });
        }
        if self.items.is_empty() {
            errors.0.push(crate::FieldError { field: "items".into(), code: "required".into(), message: "The order has no items".into() });
        } else if self.items.iter().any(|i| i.quantity == 0) {
            errors.0.push(crate::FieldError { field: "items".into(), code: "quantity".into(), message: "Item quantity must be at least 1".into() });
        } else if self.items.iter().any(|i| !within_amount(i.price)) {
            errors.0.push(crate::FieldError { field: "items".into(), code: "range".into(), message: "Item price is out of range".into() });
        }
        if !within_amount(self.total_price) {
            errors.0.push(crate::FieldError { field: "totalPrice".into(), code: "range".into(), message: "Order total is out of range".into() });
        }
        errors.0.sort_by(|a, b| a.field.cmp(&b.field));
        if errors.is_empty() { Ok(()) } else { Err(StorefrontError::Validation(errors)) }
    }

    pub fn into_order(self) -> Order {
        let CheckoutForm { name, email, phone, address, city, note } = self.checkout;
        Order {
            id: String::new(),
            items: self.items,
            total_price: self.total_price,
            customer_name: name.trim().to_string(),
            customer_email: email.trim().to_string(),
            customer_phone: phone.trim().to_string(),
            customer_address: address.trim().to_string(),
            customer_city: city.trim().to_string(),
            note: note.filter(|n| !n.trim().is_empty()),
            status: OrderStatus::New,
            seen: false,
            tracking_note: None,
            created_at: 0,
            updated_at: 0,
            owner: self.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "Ana Anić".into(),
            email: "ana@primer.rs".into(),
            phone: "+381 64 1234567".into(),
            address: "Bulevar 1".into(),
            city: "Beograd".into(),
            note: None,
        }
    }

    fn item(product_id: &str, price: i64, quantity: u32) -> OrderItem {
        OrderItem { product_id: product_id.into(), price: Decimal::from(price), quantity, ..Default::default() }
    }

    #[test]
    fn test_customer_may_only_cancel_new() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let allowed = from == OrderStatus::New && to == OrderStatus::Cancelled;
                assert_eq!(from.can_transition(to, Actor::Customer), allowed, "{from} -> {to}");
                assert!(from.can_transition(to, Actor::Admin));
            }
        }
    }

    #[test]
    fn test_owner_serializes_to_one_field() {
        let order = OrderDraft::new(OrderOwner::Guest("guest_abc".into()), form(), vec![item("p1", 10, 2)]).into_order();
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["guestDeviceId"], "guest_abc");
        assert!(value.get("userId").is_none());
        assert!(value.get("owner").is_none());

        let back: Order = serde_json::from_value(value).unwrap();
        assert_eq!(back.owner, OrderOwner::Guest("guest_abc".into()));
    }

    #[test]
    fn test_owner_reads_user_id() {
        let order: Order = serde_json::from_value(json!({
            "items": [], "totalPrice": 0, "status": "shipped", "userId": "u1"
        }))
        .unwrap();
        assert_eq!(order.owner.user_id(), Some("u1"));
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_owner_from_ids() {
        assert_eq!(OrderOwner::from_ids(Some("u1"), None).unwrap(), OrderOwner::User("u1".into()));
        assert_eq!(OrderOwner::from_ids(Some(" "), Some("g")).unwrap(), OrderOwner::Guest("g".into()));
        assert!(OrderOwner::from_ids(Some("u1"), Some("g")).is_err());
        assert!(OrderOwner::from_ids(None, None).is_err());
    }

    #[test]
    fn test_checkout_reports_every_bad_field() {
        let bad = CheckoutForm { name: " ".into(), email: "nope".into(), phone: "12ab".into(), address: String::new(), city: "Niš".into(), note: None };
        let draft = OrderDraft::new(OrderOwner::User("u1".into()), bad, Vec::new());
        let Err(StorefrontError::Validation(errors)) = draft.check() else { panic!("expected validation failure") };
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["address", "email", "items", "name", "phone"]);
    }

    #[test]
    fn test_prefilled_form() {
        let profile = UserProfile { display_name: Some("Ana".into()), city: Some("Novi Sad".into()), ..Default::default() };
        let form = CheckoutForm::prefilled(&profile, "ana@primer.rs");
        assert_eq!(form.name, "Ana");
        assert_eq!(form.city, "Novi Sad");
        assert!(form.phone.is_empty());
    }

    #[test]
    fn test_draft_total_and_order_defaults() {
        let draft = OrderDraft::new(OrderOwner::User("u1".into()), form(), vec![item("p1", 10, 2), item("p2", 5, 1)]);
        assert_eq!(draft.total_price, Decimal::from(25));
        assert!(draft.check().is_ok());
        let order = draft.into_order();
        assert_eq!(order.status, OrderStatus::New);
        assert!(!order.seen);
        assert!(order.needs_attention());
        assert_eq!(order.item_count(), 3);
    }

    #[test]
    fn test_huge_amounts_saturate_and_fail_checkout() {
        let huge = OrderItem { product_id: "p1".into(), price: Decimal::MAX, quantity: u32::MAX, ..Default::default() };
        assert_eq!(huge.line_total(), Decimal::MAX);

        let draft = OrderDraft::new(OrderOwner::User("u1".into()), form(), vec![huge.clone(), huge]);
        assert_eq!(draft.total_price, Decimal::MAX);
        let err = draft.check().unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ref f) if f.contains("items") && f.contains("totalPrice")));

        let order = draft.into_order();
        assert_eq!(order.item_count(), u32::MAX);
        assert_eq!(order.items_total(), Decimal::MAX);
    }

    #[test]
    fn test_negative_total_rejected() {
        let mut draft = OrderDraft::new(OrderOwner::User("u1".into()), form(), vec![item("p1", 10, 1)]);
        draft.total_price = Decimal::from(-1);
        assert!(matches!(draft.check(), Err(StorefrontError::Validation(ref f)) if f.contains("totalPrice")));
    }
}
