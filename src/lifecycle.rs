//! Order lifecycle
//!
//! Status changes go through [`OrderLifecycle`], which checks the state machine
//! against the stored order before writing. There is no transaction around the
//! read and the write: a concurrent admin change between the two wins per field.

use serde_json::{Map, Value};

use crate::domain::aggregates::{Order, OrderDraft, OrderStatus};
use crate::repository::{LiveCollection, Repository};
use crate::{Result, StorefrontError};

pub use crate::domain::aggregates::Actor;

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Repository<Order>,
}

impl OrderLifecycle {
    pub fn new(orders: Repository<Order>) -> Self { Self { orders } }

    pub fn orders(&self) -> &Repository<Order> { &self.orders }

    /// Validates the draft and writes the order as `new`, unseen. Returns the order id.
    /// Stock levels are neither checked nor decremented.
    pub async fn place_order(&self, draft: OrderDraft) -> Result<String> {
        draft.check()?;
        let order = draft.into_order();
        let id = self.orders.add(&order).await?;
        tracing::info!(
            order_id = %id,
            items = order.items.len(),
            total = %order.total_price,
            guest = order.owner.guest_device_id().is_some(),
            "order placed"
        );
        Ok(id)
    }

    pub async fn cancel_by_customer(&self, id: &str) -> Result<()> {
        self.transition(Actor::Customer, id, OrderStatus::Cancelled).await
    }

    /// Admin path. Any status may follow any other.
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> Result<()> {
        self.transition(Actor::Admin, id, status).await
    }

    pub async fn transition(&self, actor: Actor, id: &str, to: OrderStatus) -> Result<()> {
        let order = self.require(id).await?;
        if let Err(err) = order.check_transition(actor, to) {
            tracing::warn!(order_id = id, ?actor, from = %order.status, to = %to, "status change refused");
            return Err(err);
        }
        self.patch(id, "status", Value::String(to.as_str().to_string())).await?;
        tracing::info!(order_id = id, ?actor, from = %order.status, to = %to, "order status changed");
        Ok(())
    }

    /// Admin acknowledgement. Independent of status.
    pub async fn mark_seen(&self, id: &str, seen: bool) -> Result<()> {
        self.require(id).await?;
        self.patch(id, "seen", Value::Bool(seen)).await
    }

    /// Sets the customer-visible note, or clears it with `None` or blank text.
    pub async fn set_tracking_note(&self, id: &str, note: Option<&str>) -> Result<()> {
        self.require(id).await?;
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) => self.patch(id, "trackingNote", Value::String(note.to_string())).await,
            None => self.orders.clear_fields(id, &["trackingNote"]).await,
        }
    }

    pub async fn delete_order(&self, id: &str) -> Result<()> {
        self.orders.delete(id).await?;
        tracing::info!(order_id = id, "order deleted");
        Ok(())
    }

    pub fn watch_all(&self) -> LiveCollection<Order> { self.orders.watch() }

    pub fn watch_for_user(&self, user_id: &str) -> LiveCollection<Order> { self.orders.watch_for_user(user_id) }

    pub fn watch_for_guest(&self, guest_device_id: &str) -> LiveCollection<Order> { self.orders.watch_for_guest(guest_device_id) }

    async fn require(&self, id: &str) -> Result<Order> {
        self.orders.get(id).await?.ok_or_else(|| StorefrontError::OrderNotFound(id.to_string()))
    }

    async fn patch(&self, id: &str, field: &str, value: Value) -> Result<()> {
        let mut partial = Map::new();
        partial.insert(field.to_string(), value);
        self.orders.update(id, &partial).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CheckoutForm, OrderItem, OrderOwner};
    use crate::store::{DocumentStore, MemoryStore};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn lifecycle() -> (Arc<MemoryStore>, OrderLifecycle) {
        let store = Arc::new(MemoryStore::connect());
        (store.clone(), OrderLifecycle::new(Repository::new(store)))
    }

    fn draft() -> OrderDraft {
        let form = CheckoutForm { name: "Ana".into(), email: "ana@primer.rs".into(), phone: "064 123 4567".into(), address: "Ulica 1".into(), city: "Beograd".into(), note: Some("  ".into()) };
        let item = OrderItem { product_id: "p1".into(), product_name: "Šator".into(), price: Decimal::from(10), quantity: 2, ..Default::default() };
        OrderDraft::new(OrderOwner::Guest("guest_1".into()), form, vec![item])
    }

    #[tokio::test]
    async fn test_customer_cancel_only_from_new() {
        for from in OrderStatus::ALL {
            let (_, lifecycle) = lifecycle();
            let id = lifecycle.place_order(draft()).await.unwrap();
            lifecycle.set_status(&id, from).await.unwrap();

            let result = lifecycle.cancel_by_customer(&id).await;
            let stored = lifecycle.orders().get(&id).await.unwrap().unwrap();
            if from == OrderStatus::New {
                assert!(result.is_ok());
                assert_eq!(stored.status, OrderStatus::Cancelled);
            } else {
                assert!(matches!(result, Err(StorefrontError::InvalidTransition { from: f, to: OrderStatus::Cancelled }) if f == from));
                assert_eq!(stored.status, from);
            }
        }
    }

    #[tokio::test]
    async fn test_admin_may_reopen_terminal_order() {
        let (_, lifecycle) = lifecycle();
        let id = lifecycle.place_order(draft()).await.unwrap();
        lifecycle.set_status(&id, OrderStatus::Delivered).await.unwrap();
        lifecycle.transition(Actor::Admin, &id, OrderStatus::Processing).await.unwrap();
        assert_eq!(lifecycle.orders().get(&id).await.unwrap().unwrap().status, OrderStatus::Processing);
        assert!(lifecycle.transition(Actor::Customer, &id, OrderStatus::Shipped).await.is_err());
    }

    #[tokio::test]
    async fn test_seen_and_tracking_note_leave_status_alone() {
        let (_, lifecycle) = lifecycle();
        let id = lifecycle.place_order(draft()).await.unwrap();
        lifecycle.mark_seen(&id, true).await.unwrap();
        lifecycle.set_tracking_note(&id, Some("Poslato kurirskom službom")).await.unwrap();
        let stored = lifecycle.orders().get(&id).await.unwrap().unwrap();
        assert!(stored.seen);
        assert_eq!(stored.status, OrderStatus::New);
        assert_eq!(stored.tracking_note.as_deref(), Some("Poslato kurirskom službom"));
        assert_eq!(stored.note, None);

        lifecycle.set_tracking_note(&id, None).await.unwrap();
        assert_eq!(lifecycle.orders().get(&id).await.unwrap().unwrap().tracking_note, None);
    }

    #[tokio::test]
    async fn test_invalid_checkout_writes_nothing() {
        let (_, lifecycle) = lifecycle();
        let mut bad = draft();
        bad.checkout.phone = "call me".into();
        let err = lifecycle.place_order(bad).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ref f) if f.contains("phone")));
        assert!(lifecycle.orders().get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_order() {
        let (_, lifecycle) = lifecycle();
        assert!(matches!(lifecycle.cancel_by_customer("nope").await, Err(StorefrontError::OrderNotFound(_))));
        assert!(matches!(lifecycle.mark_seen("bad/id", true).await, Err(StorefrontError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let (store, lifecycle) = lifecycle();
        store.close().await;
        assert!(matches!(lifecycle.place_order(draft()).await, Err(StorefrontError::StoreUnavailable)));
    }
}
