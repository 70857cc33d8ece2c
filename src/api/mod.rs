//! HTTP surface: order placement, lookup and listing.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::OrderService;
use crate::domain::aggregates::{Address, Cart, CartItem, Checkout, LineItem, Order, OrderStatus};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Money, OrderNumber};
use crate::EcommerceError;

const CHECKOUT_FAILED: &str = "could not create order, please retry";
/// `order_items.quantity` is an INTEGER column.
const MAX_QUANTITY: u32 = i32::MAX as u32;
/// Amounts are stored as NUMERIC(12,2).
const MAX_AMOUNT_SCALE: u32 = 2;

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub nats: Option<async_nats::Client>,
    pub currency: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "instrument-store"})) }))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:order_number", get(get_order))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

pub struct ApiError { error: EcommerceError, failure: &'static str }

impl From<EcommerceError> for ApiError {
    fn from(error: EcommerceError) -> Self { Self { error, failure: "internal error" } }
}

fn checkout_failed(error: EcommerceError) -> ApiError { ApiError { error, failure: CHECKOUT_FAILED } }

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.error {
            EcommerceError::InvalidOrder(m) => (StatusCode::BAD_REQUEST, m.clone()),
            EcommerceError::InvalidOrderNumber(_) => (StatusCode::BAD_REQUEST, self.error.to_string()),
            EcommerceError::OrderNotFound => (StatusCode::NOT_FOUND, self.error.to_string()),
            EcommerceError::Configuration(_) | EcommerceError::Conflict(_) | EcommerceError::Storage(_) => {
                error!(error = %self.error, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.failure.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// =============================================================================
// Requests / responses
// =============================================================================

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, message = "No items in cart"))]
    pub items: Vec<OrderItemRequest>,
    pub shipping: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate(length(max = 64, message = "Coupon code too long"))]
    pub coupon_code: Option<String>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemRequest { pub product_id: Uuid, pub name: String, pub sku: Option<String>, pub quantity: u32, pub price: Decimal }

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse { pub order_id: OrderNumber, pub message: String }

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: Option<OrderNumber>,
    pub customer_id: Option<Uuid>,
    pub email: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id(), order_number: o.order_number().cloned(), customer_id: o.customer_id(), email: o.email().to_string(),
            status: o.status(), items: o.items().to_vec(), subtotal: o.subtotal().clone(), shipping: o.shipping().clone(),
            discount: o.discount().clone(), total: o.total().clone(), coupon_code: o.coupon_code().map(str::to_string),
            shipping_address: o.shipping_address().cloned(), created_at: o.created_at(), updated_at: o.updated_at(),
        }
    }
}

impl CreateOrderRequest {
    fn into_checkout(self, currency: &str) -> Result<Checkout, EcommerceError> {
        let amounts = self.items.iter().map(|i| i.price).chain(self.shipping).chain(self.discount);
        for amount in amounts {
            if amount.normalize().scale() > MAX_AMOUNT_SCALE {
                return Err(EcommerceError::InvalidOrder(format!("Amount {amount} has more than {MAX_AMOUNT_SCALE} decimal places")));
            }
        }
        let mut cart = Cart::new(currency);
        for item in self.items {
            cart.add_item(CartItem {
                product_id: item.product_id, name: item.name, sku: item.sku,
                quantity: item.quantity, unit_price: Money::new(item.price, currency),
            })?;
        }
        // checked after merging, repeated lines add up
        if cart.items().iter().any(|i| i.quantity > MAX_QUANTITY) {
            return Err(EcommerceError::InvalidOrder(format!("Quantity must be at most {MAX_QUANTITY}")));
        }
        Ok(Checkout {
            email: self.email, customer_id: self.customer_id, cart,
            shipping: Money::new(self.shipping.unwrap_or_default(), currency),
            discount: Money::new(self.discount.unwrap_or_default(), currency),
            coupon_code: self.coupon_code, shipping_address: self.shipping_address,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_order(
    State(s): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let Json(r) = payload.map_err(|e| EcommerceError::InvalidOrder(e.body_text()))?;
    r.validate().map_err(|e| EcommerceError::InvalidOrder(e.to_string()))?;
    let checkout = r.into_checkout(&s.currency)?;
    let mut order = s.orders.place_order(checkout).await.map_err(checkout_failed)?;
    publish(s.nats.as_ref(), order.take_events()).await;
    let order_id = order.order_number().cloned().ok_or_else(|| checkout_failed(EcommerceError::InvalidOrder("order stored without number".into())))?;
    Ok((StatusCode::CREATED, Json(CreateOrderResponse { order_id, message: "Order created successfully".into() })))
}

async fn get_order(State(s): State<AppState>, Path(order_number): Path<String>) -> Result<Json<OrderView>, ApiError> {
    let order = s.orders.find_by_number(&order_number).await?;
    Ok(Json(OrderView::from(&order)))
}

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<OrderView>>, ApiError> {
    let (orders, total, page) = s.orders.list_orders(p.page, p.per_page).await?;
    Ok(Json(PaginatedResponse { data: orders.iter().map(OrderView::from).collect(), total, page }))
}

/// Best effort: a lost event never fails the order.
async fn publish(nats: Option<&async_nats::Client>, events: Vec<DomainEvent>) {
    let Some(nats) = nats else { return };
    for event in events {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { warn!(error = %e, "could not encode event"); continue; }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            warn!(error = %e, subject = event.subject(), "could not publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::value_objects::OrderNumberGenerator;
    use crate::infrastructure::InMemoryOrderRepository;
    use crate::repository::{OrderRepository, StoreError, ORDER_NUMBER_CONSTRAINT};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TakenStore;

    #[async_trait]
    impl OrderRepository for TakenStore {
        async fn insert(&self, _: &Order) -> Result<(), StoreError> { Err(StoreError::UniqueViolation { constraint: ORDER_NUMBER_CONSTRAINT.into() }) }
        async fn find_by_number(&self, _: &OrderNumber) -> Result<Option<Order>, StoreError> { Ok(None) }
        async fn list(&self, _: i64, _: i64) -> Result<(Vec<Order>, i64), StoreError> { Ok((vec![], 0)) }
        async fn without_order_number(&self) -> Result<Vec<Order>, StoreError> { Ok(vec![]) }
        async fn assign_order_number(&self, id: Uuid, _: &OrderNumber) -> Result<(), StoreError> { Err(StoreError::Missing(id)) }
    }

    fn app(repo: Arc<dyn OrderRepository>) -> Router {
        let clock = FixedClock("2025-09-01T06:50:21Z".parse().unwrap());
        let orders = OrderService::new(repo, Arc::new(clock), OrderNumberGenerator::default());
        router(AppState { orders, nats: None, currency: "USD".into() })
    }

    fn order_body(email: &str, items: serde_json::Value) -> Body {
        Body::from(serde_json::json!({
            "email": email,
            "items": items,
            "shipping": "25.00",
            "shipping_address": {
                "first_name": "Linh", "last_name": "Tran", "address1": "12 Nguyen Hue",
                "city": "Ho Chi Minh City", "zip": "700000", "country": "VN"
            }
        }).to_string())
    }

    fn guitar() -> serde_json::Value {
        serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Classical Guitar", "quantity": 1, "price": "320.00" }])
    }

    fn post(body: Body) -> Request<Body> {
        Request::builder().method("POST").uri("/api/v1/orders").header("content-type", "application/json").body(body).unwrap()
    }

    async fn json(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app(Arc::new(InMemoryOrderRepository::new()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_then_fetch_order() {
        let app = app(Arc::new(InMemoryOrderRepository::new()));
        let resp = app.clone().oneshot(post(order_body("linh@example.com", guitar()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: CreateOrderResponse = serde_json::from_value(json(resp).await).unwrap();
        assert_eq!(created.order_id.as_str(), "192513502100021");

        let resp = app.clone()
            .oneshot(Request::builder().uri("/api/v1/orders/192513502100021").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json(resp).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["email"], "linh@example.com");
        assert_eq!(body["shipping_address"]["city"], "Ho Chi Minh City");

        let resp = app.oneshot(Request::builder().uri("/api/v1/orders?page=1&per_page=5").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(json(resp).await["total"], 1);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let app = app(Arc::new(InMemoryOrderRepository::new()));
        let resp = app.clone().oneshot(post(order_body("not-an-email", guitar()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = app.clone().oneshot(post(order_body("linh@example.com", serde_json::json!([])))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let zero = serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Ukulele", "quantity": 0, "price": "50" }]);
        let resp = app.oneshot(post(order_body("linh@example.com", zero))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_bad_request() {
        let app = app(Arc::new(InMemoryOrderRepository::new()));
        let negative = serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Cajon", "quantity": -1, "price": "80" }]);
        let resp = app.clone().oneshot(post(order_body("linh@example.com", negative))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["error"].as_str().is_some_and(|m| !m.is_empty()));

        let resp = app.oneshot(post(Body::from("{\"email\": "))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_quantity_and_amount_bounds() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let app = app(repo.clone());
        let huge = serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Drum Kit", "quantity": 2147483648u64, "price": "900.00" }]);
        let resp = app.clone().oneshot(post(order_body("linh@example.com", huge))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let id = Uuid::now_v7();
        let split = serde_json::json!([
            { "product_id": id, "name": "Drum Kit", "quantity": 2147483647u64, "price": "900.00" },
            { "product_id": id, "name": "Drum Kit", "quantity": 1, "price": "900.00" },
        ]);
        let resp = app.clone().oneshot(post(order_body("linh@example.com", split))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let precise = serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Violin", "quantity": 1, "price": "9.999" }]);
        let resp = app.clone().oneshot(post(order_body("linh@example.com", precise))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["error"].as_str().unwrap().contains("decimal places"));

        let padded = serde_json::json!([{ "product_id": Uuid::now_v7(), "name": "Violin", "quantity": 3, "price": "9.9900" }]);
        let resp = app.oneshot(post(order_body("linh@example.com", padded))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let app = app(Arc::new(InMemoryOrderRepository::new()));
        let resp = app.clone().oneshot(Request::builder().uri("/api/v1/orders/999921").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = app.oneshot(Request::builder().uri("/api/v1/orders/ORD-1").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_conflict_shows_generic_message() {
        let resp = app(Arc::new(TakenStore)).oneshot(post(order_body("linh@example.com", guitar()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(resp).await["error"], CHECKOUT_FAILED);
    }
}
