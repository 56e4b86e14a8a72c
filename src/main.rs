//! Storefront Sync - JSON API over the storefront document store

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{header::USER_AGENT, HeaderMap, StatusCode}, routing::{get, post, put}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_sync::analytics::{self, Calendar, SalesSummary, ViewPeriod};
use storefront_sync::domain::aggregates::{Category, CategoryPatch, ChatMessage, CheckoutForm, Order, OrderDraft, OrderItem, OrderOwner, OrderStatus, Product, ProductPatch, Subcategory, SubcategoryPatch};
use storefront_sync::{Config, Storefront, StorefrontError};

type ApiResult<T> = std::result::Result<T, (StatusCode, String)>;

#[derive(Clone)] pub struct AppState { pub storefront: Storefront, pub calendar: Calendar }

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into())).with(tracing_subscriber::fmt::layer()).init();
    let storefront = Storefront::connect(&config).await?;
    let state = AppState { storefront: storefront.clone(), calendar: config.calendar()? };

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-sync"})) }))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product).patch(update_product).delete(delete_product))
        .route("/api/v1/categories", get(list_categories).post(create_category))
        .route("/api/v1/categories/:id", get(get_category).patch(update_category).delete(delete_category))
        .route("/api/v1/subcategories", get(list_subcategories).post(create_subcategory))
        .route("/api/v1/subcategories/:id", axum::routing::patch(update_subcategory).delete(delete_subcategory))
        .route("/api/v1/messages", get(list_messages).post(create_message))
        .route("/api/v1/messages/:id", axum::routing::delete(delete_message))
        .route("/api/v1/messages/:id/read", put(mark_message_read))
        .route("/api/v1/messages/:id/reply", post(reply_message))
        .route("/api/v1/orders", get(list_orders).post(place_order))
        .route("/api/v1/orders/:id", get(get_order).delete(delete_order))
        .route("/api/v1/orders/:id/cancel", post(cancel_order))
        .route("/api/v1/orders/:id/status", put(set_order_status))
        .route("/api/v1/orders/:id/seen", put(set_order_seen))
        .route("/api/v1/orders/:id/tracking-note", put(set_tracking_note))
        .route("/api/v1/users/:user_id/orders", get(user_orders))
        .route("/api/v1/guests/:device_id/orders", get(guest_orders))
        .route("/api/v1/views", post(record_view))
        .route("/api/v1/analytics/sales", get(sales_summary))
        .route("/api/v1/analytics/views", get(view_report))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    tracing::info!("🚀 Storefront Sync listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app)
        .with_graceful_shutdown(async { tokio::signal::ctrl_c().await.ok(); })
        .await?;
    storefront.close().await;
    Ok(())
}

fn reject(e: StorefrontError) -> (StatusCode, String) {
    let status = match &e {
        StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorefrontError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StorefrontError::OrderNotFound(_) | StorefrontError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorefrontError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        StorefrontError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match &e {
        StorefrontError::Validation(fields) => json!({"error": e.to_string(), "fields": fields}).to_string(),
        _ => json!({"error": e.to_string()}).to_string(),
    };
    (status, body)
}

fn not_found() -> (StatusCode, String) { (StatusCode::NOT_FOUND, "Not found".to_string()) }

fn created(id: String) -> (StatusCode, Json<Value>) { (StatusCode::CREATED, Json(json!({"id": id}))) }

// Catalog

#[derive(Debug, Deserialize)] pub struct ProductParams { pub slug: Option<String>, pub category: Option<String> }

async fn list_products(State(s): State<AppState>, Query(p): Query<ProductParams>) -> Json<Vec<Product>> {
    let mut products = s.storefront.products.get_all().await;
    if let Some(slug) = p.slug { products.retain(|x| x.slug == slug); }
    if let Some(category) = p.category { products.retain(|x| x.category_slug == category); }
    Json(products)
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    s.storefront.products.get(&id).await.map_err(reject)?.map(Json).ok_or_else(not_found)
}

async fn create_product(State(s): State<AppState>, Json(r): Json<Product>) -> ApiResult<(StatusCode, Json<Value>)> {
    s.storefront.products.add(&r).await.map(created).map_err(reject)
}

async fn update_product(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ProductPatch>) -> ApiResult<StatusCode> {
    s.storefront.products.update(&id, &r).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.products.delete(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(State(s): State<AppState>) -> Json<Vec<Category>> { Json(s.storefront.categories.get_all().await) }

async fn get_category(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Category>> {
    s.storefront.categories.get(&id).await.map_err(reject)?.map(Json).ok_or_else(not_found)
}

async fn create_category(State(s): State<AppState>, Json(r): Json<Category>) -> ApiResult<(StatusCode, Json<Value>)> {
    s.storefront.categories.add(&r).await.map(created).map_err(reject)
}

async fn update_category(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<CategoryPatch>) -> ApiResult<StatusCode> {
    s.storefront.categories.update(&id, &r).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_category(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.categories.delete(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct SubcategoryParams { pub category_id: Option<String> }

async fn list_subcategories(State(s): State<AppState>, Query(p): Query<SubcategoryParams>) -> Json<Vec<Subcategory>> {
    match p.category_id {
        Some(category_id) => Json(s.storefront.subcategories.subcategories_of(&category_id).await),
        None => Json(s.storefront.subcategories.get_all().await),
    }
}

async fn create_subcategory(State(s): State<AppState>, Json(r): Json<Subcategory>) -> ApiResult<(StatusCode, Json<Value>)> {
    s.storefront.subcategories.add(&r).await.map(created).map_err(reject)
}

async fn update_subcategory(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<SubcategoryPatch>) -> ApiResult<StatusCode> {
    s.storefront.subcategories.update(&id, &r).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_subcategory(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.subcategories.delete(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Inquiries

async fn list_messages(State(s): State<AppState>) -> Json<Value> {
    let messages = s.storefront.messages.get_all().await;
    let unread = messages.iter().filter(|m| !m.read).count();
    Json(json!({"data": messages, "unread": unread}))
}

async fn create_message(State(s): State<AppState>, Json(r): Json<ChatMessage>) -> ApiResult<(StatusCode, Json<Value>)> {
    s.storefront.messages.add(&r).await.map(created).map_err(reject)
}

#[derive(Debug, Deserialize)] pub struct ReadRequest { pub read: Option<bool> }

async fn mark_message_read(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ReadRequest>) -> ApiResult<StatusCode> {
    s.storefront.messages.mark_read(&id, r.read.unwrap_or(true)).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct ReplyRequest { pub reply: String }

async fn reply_message(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ReplyRequest>) -> ApiResult<StatusCode> {
    s.storefront.messages.reply(&id, &r.reply).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.messages.delete(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Orders

async fn list_orders(State(s): State<AppState>) -> Json<Vec<Order>> { Json(s.storefront.orders.get_all().await) }

async fn get_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    s.storefront.orders.get(&id).await.map_err(reject)?.map(Json).ok_or_else(not_found)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub user_id: Option<String>, pub guest_device_id: Option<String>,
    pub checkout: CheckoutForm, pub items: Vec<OrderItem>, pub total_price: Option<Decimal>,
}

async fn place_order(State(s): State<AppState>, Json(r): Json<PlaceOrderRequest>) -> ApiResult<(StatusCode, Json<Value>)> {
    let owner = OrderOwner::from_ids(r.user_id.as_deref(), r.guest_device_id.as_deref()).map_err(reject)?;
    let mut draft = OrderDraft::new(owner, r.checkout, r.items);
    if let Some(total) = r.total_price { draft.total_price = total; }
    s.storefront.lifecycle.place_order(draft).await.map(created).map_err(reject)
}

async fn cancel_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.lifecycle.cancel_by_customer(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: OrderStatus }

async fn set_order_status(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<StatusRequest>) -> ApiResult<StatusCode> {
    s.storefront.lifecycle.set_status(&id, r.status).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct SeenRequest { pub seen: bool }

async fn set_order_seen(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<SeenRequest>) -> ApiResult<StatusCode> {
    s.storefront.lifecycle.mark_seen(&id, r.seen).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct TrackingNoteRequest { pub note: Option<String> }

async fn set_tracking_note(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<TrackingNoteRequest>) -> ApiResult<StatusCode> {
    s.storefront.lifecycle.set_tracking_note(&id, r.note.as_deref()).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.storefront.lifecycle.delete_order(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_orders(State(s): State<AppState>, Path(user_id): Path<String>) -> Json<Vec<Order>> { Json(s.storefront.orders.for_user(&user_id).await) }

async fn guest_orders(State(s): State<AppState>, Path(device_id): Path<String>) -> Json<Vec<Order>> { Json(s.storefront.orders.for_guest(&device_id).await) }

// Views and analytics

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewRequest { pub product_id: String, pub product_name: String, pub user_agent: Option<String>, pub referrer: Option<String> }

async fn record_view(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<RecordViewRequest>) -> ApiResult<(StatusCode, Json<Value>)> {
    let header_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    let user_agent = r.user_agent.as_deref().or(header_agent);
    s.storefront.views.record_view(&r.product_id, &r.product_name, user_agent, r.referrer.as_deref()).await.map(created).map_err(reject)
}

async fn sales_summary(State(s): State<AppState>) -> Json<SalesSummary> {
    let orders = s.storefront.orders.get_all().await;
    Json(analytics::summarize(&orders, Utc::now(), &s.calendar))
}

#[derive(Debug, Deserialize)] pub struct ViewParams { pub product_id: Option<String>, pub period: Option<String>, pub limit: Option<usize> }

async fn view_report(State(s): State<AppState>, Query(p): Query<ViewParams>) -> ApiResult<Json<Value>> {
    let period = match p.period.as_deref() {
        None => ViewPeriod::All,
        Some(raw) => ViewPeriod::parse(raw).ok_or((StatusCode::BAD_REQUEST, format!("unknown period {raw:?}")))?,
    };
    let views = s.storefront.views.get_all().await;
    let most_viewed = analytics::most_viewed(&views, p.limit.unwrap_or(10).min(100));
    let report = p.product_id.map(|id| analytics::product_view_report(&views, &id, period, Utc::now(), &s.calendar));
    Ok(Json(json!({"total": views.len(), "mostViewed": most_viewed, "report": report})))
}
