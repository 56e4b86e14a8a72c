//! Order queries

use super::{Entity, LiveCollection, Repository};
use crate::domain::aggregates::{Order, OrderStatus};

impl Entity for Order {
    const COLLECTION: &'static str = "orders";
    const UPDATED_FIELDS: &'static [&'static str] = &["updatedAt"];

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    /// Placement always starts a fresh, unacknowledged order.
    fn prepare_new(&mut self) {
        self.status = OrderStatus::New;
        self.seen = false;
        self.tracking_note = None;
    }

    fn sort(items: &mut [Self]) { items.sort_by(|a, b| b.created_at.cmp(&a.created_at)); }
}

impl Repository<Order> {
    /// Live order history of an authenticated user.
    pub fn watch_for_user(&self, user_id: &str) -> LiveCollection<Order> {
        let user_id = user_id.to_string();
        self.watch_where(move |o| o.owner.user_id() == Some(user_id.as_str()))
    }

    /// Live order history of an anonymous device. Orders later placed from an
    /// account on the same device do not show up here.
    pub fn watch_for_guest(&self, guest_device_id: &str) -> LiveCollection<Order> {
        let guest_device_id = guest_device_id.to_string();
        self.watch_where(move |o| o.owner.guest_device_id() == Some(guest_device_id.as_str()))
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<Order> {
        self.get_where(|o| o.owner.user_id() == Some(user_id)).await
    }

    pub async fn for_guest(&self, guest_device_id: &str) -> Vec<Order> {
        self.get_where(|o| o.owner.guest_device_id() == Some(guest_device_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CheckoutForm, OrderDraft, OrderItem, OrderOwner};
    use crate::store::{DocumentStore, MemoryStore};
    use futures::StreamExt;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn order(owner: OrderOwner) -> Order {
        let form = CheckoutForm { name: "Ana".into(), email: "ana@primer.rs".into(), phone: "0641234567".into(), address: "Ulica 1".into(), city: "Beograd".into(), note: None };
        let item = OrderItem { product_id: "p1".into(), price: Decimal::from(10), quantity: 1, ..Default::default() };
        OrderDraft::new(owner, form, vec![item]).into_order()
    }

    #[tokio::test]
    async fn test_add_forces_new_and_unseen() {
        let orders: Repository<Order> = Repository::new(Arc::new(MemoryStore::connect()));
        let mut forged = order(OrderOwner::User("u1".into()));
        forged.status = OrderStatus::Delivered;
        forged.seen = true;
        let id = orders.add(&forged).await.unwrap();
        let stored = orders.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::New);
        assert!(!stored.seen);
    }

    #[tokio::test]
    async fn test_owner_scoped_queries_do_not_mix() {
        let orders: Repository<Order> = Repository::new(Arc::new(MemoryStore::connect()));
        orders.add(&order(OrderOwner::User("u1".into()))).await.unwrap();
        orders.add(&order(OrderOwner::Guest("guest_1".into()))).await.unwrap();
        orders.add(&order(OrderOwner::Guest("guest_2".into()))).await.unwrap();

        assert_eq!(orders.for_user("u1").await.len(), 1);
        assert_eq!(orders.for_guest("guest_1").await.len(), 1);
        assert!(orders.for_user("guest_1").await.is_empty());

        let mut live = orders.watch_for_guest("guest_2");
        let first = live.next().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].owner.guest_device_id(), Some("guest_2"));
    }

    #[tokio::test]
    async fn test_live_query_offline_yields_empty_once() {
        let store = Arc::new(MemoryStore::connect());
        let orders: Repository<Order> = Repository::new(store.clone());
        store.close().await;
        let mut live = orders.watch_for_user("u1");
        assert!(!live.is_live());
        assert_eq!(live.next().await, Some(Vec::new()));
        assert_eq!(live.next().await, None);
    }
}
