use futures::StreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use storefront_sync::analytics::{self, Calendar};
use storefront_sync::domain::aggregates::{Cart, CheckoutForm, OrderDraft, OrderItem, OrderStatus, Product, ProductPatch};
use storefront_sync::identity::{resolve_owner, FileStorage, MemoryStorage};
use storefront_sync::{Config, DocumentStore, MemoryStore, SqliteStore, Storefront, StorefrontError};

fn checkout() -> CheckoutForm {
    CheckoutForm {
        name: "Jelena Jovanović".into(),
        email: "jelena@primer.rs".into(),
        phone: "+381 63 555 0101".into(),
        address: "Knez Mihailova 5".into(),
        city: "Beograd".into(),
        note: None,
    }
}

fn line(product_id: &str, price: i64, quantity: u32) -> OrderItem {
    OrderItem { product_id: product_id.into(), product_name: format!("Proizvod {product_id}"), price: Decimal::from(price), quantity, ..Default::default() }
}

#[tokio::test]
async fn guest_order_snapshot_survives_catalog_price_change() {
    let storefront = Storefront::new(Arc::new(MemoryStore::connect()));
    let device = MemoryStorage::default();
    let owner = resolve_owner(None, &device).unwrap();
    let guest_id = owner.guest_device_id().unwrap().to_string();

    let p1 = storefront.products.add(&Product::new("Šator", Decimal::from(10), "Kamp")).await.unwrap();

    let mut live = storefront.lifecycle.watch_for_guest(&guest_id);
    assert!(live.next().await.unwrap().is_empty());

    let mut draft = OrderDraft::new(owner, checkout(), vec![line(&p1, 10, 2), line("p2", 5, 1)]);
    draft.total_price = Decimal::from(25);
    let order_id = storefront.lifecycle.place_order(draft).await.unwrap();

    let orders = live.next().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order_id);
    assert_eq!(orders[0].status, OrderStatus::New);
    assert!(!orders[0].seen);
    assert_eq!(orders[0].total_price, Decimal::from(25));

    storefront.products.update(&p1, &ProductPatch { price: Some(Decimal::from(12)), ..Default::default() }).await.unwrap();
    assert_eq!(storefront.products.get(&p1).await.unwrap().unwrap().price, Decimal::from(12));

    // catalog edits are not order changes
    assert!(tokio::time::timeout(Duration::from_millis(50), live.next()).await.is_err());

    storefront.lifecycle.mark_seen(&order_id, true).await.unwrap();
    let orders = tokio::time::timeout(Duration::from_secs(1), live.next()).await.unwrap().unwrap();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].seen);
    assert_eq!(orders[0].items[0].price, Decimal::from(10));
    assert_eq!(orders[0].items[0].quantity, 2);
    assert_eq!(orders[0].items[1].price, Decimal::from(5));
    assert_eq!(orders[0].total_price, Decimal::from(25));

    let orders = storefront.orders.for_guest(&guest_id).await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].items[0].price, Decimal::from(10));
    assert_eq!(orders[0].items[0].quantity, 2);
    assert_eq!(orders[0].items[1].price, Decimal::from(5));

    // an account on the same device never sees the guest order
    assert!(storefront.orders.for_user("uid-1").await.is_empty());
}

#[tokio::test]
async fn cart_checkout_then_customer_cancel() {
    let storefront = Storefront::new(Arc::new(MemoryStore::connect()));
    let dir = tempfile::tempdir().unwrap();
    let device = FileStorage::open(dir.path()).unwrap();

    let id = storefront.products.add(&Product::new("Lampa", Decimal::from(15), "Kamp")).await.unwrap();
    let lamp = storefront.products.get(&id).await.unwrap().unwrap();

    let mut cart = Cart::load(&device).unwrap();
    cart.add(&lamp, &lamp.default_variant(), 2).unwrap();
    cart.save(&device).unwrap();

    let cart = Cart::load(&device).unwrap();
    let owner = resolve_owner(Some("uid-7"), &device).unwrap();
    let order_id = storefront.lifecycle.place_order(OrderDraft::new(owner, checkout(), cart.to_order_items())).await.unwrap();

    let placed = storefront.orders.get(&order_id).await.unwrap().unwrap();
    assert_eq!(placed.total_price, Decimal::from(30));
    assert_eq!(placed.owner.user_id(), Some("uid-7"));

    storefront.lifecycle.cancel_by_customer(&order_id).await.unwrap();
    let again = storefront.lifecycle.cancel_by_customer(&order_id).await;
    assert!(matches!(again, Err(StorefrontError::InvalidTransition { from: OrderStatus::Cancelled, to: OrderStatus::Cancelled })));
}

#[tokio::test]
async fn admin_dashboard_reflects_live_orders() {
    let storefront = Storefront::new(Arc::new(MemoryStore::connect()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _handle = storefront.orders.subscribe(move |orders| {
        let _ = tx.send(orders);
    });
    assert!(rx.recv().await.unwrap().is_empty());

    let owner = resolve_owner(Some("uid-1"), &MemoryStorage::default()).unwrap();
    let first = storefront.lifecycle.place_order(OrderDraft::new(owner.clone(), checkout(), vec![line("p1", 100, 1)])).await.unwrap();
    let _ = rx.recv().await;
    storefront.lifecycle.place_order(OrderDraft::new(owner, checkout(), vec![line("p1", 50, 1), line("p2", 50, 3)])).await.unwrap();
    let _ = rx.recv().await;
    storefront.lifecycle.set_status(&first, OrderStatus::Shipped).await.unwrap();

    let orders = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders[0].created_at >= orders[1].created_at);

    let summary = analytics::summarize(&orders, chrono::Utc::now(), &Calendar::default());
    assert_eq!(summary.total.revenue, Decimal::from(300));
    assert_eq!(summary.this_month.orders, 2);
    assert_eq!(summary.average_order_value, Decimal::from(150));
    assert_eq!(summary.status_distribution[&OrderStatus::Shipped], 1);
    assert_eq!(summary.products.top[0].product_id, "p2");
    assert_eq!(summary.unique_customers, 1);
}

#[tokio::test]
async fn sqlite_store_backs_the_same_flow() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("shop.db").display());
    let config = Config { store_url: Some(url.clone()), ..Config::default() };

    let storefront = Storefront::connect(&config).await.unwrap();
    let owner = resolve_owner(None, &MemoryStorage::default()).unwrap();
    let order_id = storefront.lifecycle.place_order(OrderDraft::new(owner, checkout(), vec![line("p1", 10, 1)])).await.unwrap();
    storefront.lifecycle.set_tracking_note(&order_id, Some("Kurir stiže sutra")).await.unwrap();
    storefront.close().await;
    assert!(storefront.orders.get_all().await.is_empty());

    let reopened = Storefront::new(Arc::new(SqliteStore::connect(&url, 2).await.unwrap()));
    let order = reopened.orders.get(&order_id).await.unwrap().unwrap();
    assert_eq!(order.tracking_note.as_deref(), Some("Kurir stiže sutra"));
    reopened.store().close().await;
}
