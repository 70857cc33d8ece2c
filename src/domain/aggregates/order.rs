//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError, OrderNumber};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: Option<OrderNumber>,
    customer_id: Option<Uuid>,
    email: String,
    status: OrderStatus,
    items: Vec<LineItem>,
    subtotal: Money,
    shipping: Money,
    discount: Money,
    total: Money,
    coupon_code: Option<String>,
    shipping_address: Option<Address>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem { pub id: Uuid, pub product_id: Uuid, pub name: String, pub sku: Option<String>, pub quantity: u32, pub unit_price: Money }

impl LineItem {
    pub fn total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Paid, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, OrderError> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// What the storefront hands over when the customer checks out.
#[derive(Clone, Debug)]
pub struct Checkout {
    pub email: String,
    pub customer_id: Option<Uuid>,
    pub cart: Cart,
    pub shipping: Money,
    pub discount: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: Option<Address>,
}

/// Persisted state of an order, as read back from storage.
#[derive(Clone, Debug)]
pub struct OrderRecord {
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

impl Order {
    pub fn create(order_number: OrderNumber, checkout: Checkout, created_at: DateTime<Utc>) -> Result<Self, OrderError> {
        let Checkout { email, customer_id, cart, shipping, discount, coupon_code, shipping_address } = checkout;
        if cart.is_empty() { return Err(OrderError::NoItems); }
        if shipping.is_negative() || discount.is_negative() { return Err(OrderError::InvalidAmount); }
        let items: Vec<LineItem> = cart.items().iter().map(|i| LineItem {
            id: Uuid::now_v7(), product_id: i.product_id, name: i.name.clone(), sku: i.sku.clone(),
            quantity: i.quantity, unit_price: i.unit_price.clone(),
        }).collect();
        let subtotal = cart.subtotal().clone();
        let total = subtotal.add(&shipping)?.subtract(&discount)?;
        if total.is_negative() { return Err(OrderError::InvalidAmount); }

        let mut order = Self {
            id: Uuid::now_v7(), order_number: Some(order_number), customer_id,
            email, status: OrderStatus::Pending, items, subtotal, shipping, discount, total, coupon_code,
            shipping_address, created_at, updated_at: created_at, events: vec![],
        };
        order.raise_placed();
        Ok(order)
    }

    pub fn restore(record: OrderRecord) -> Self {
        let OrderRecord {
            id, order_number, customer_id, email, status, items, subtotal, shipping, discount, total,
            coupon_code, shipping_address, created_at, updated_at,
        } = record;
        Self {
            id, order_number, customer_id, email, status, items, subtotal, shipping, discount, total,
            coupon_code, shipping_address, created_at, updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> Option<&OrderNumber> { self.order_number.as_ref() }
    pub fn customer_id(&self) -> Option<Uuid> { self.customer_id }
    pub fn email(&self) -> &str { &self.email }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn shipping(&self) -> &Money { &self.shipping }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn total(&self) -> &Money { &self.total }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn shipping_address(&self) -> Option<&Address> { self.shipping_address.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Numbers legacy orders that were stored without one.
    pub fn assign_order_number(&mut self, number: OrderNumber) -> Result<(), OrderError> {
        if self.order_number.is_some() { return Err(OrderError::NumberAlreadyAssigned); }
        self.order_number = Some(number);
        self.touch();
        Ok(())
    }

    /// Swaps the candidate number of an order that storage has not yet accepted.
    pub(crate) fn with_candidate_number(mut self, number: OrderNumber) -> Self {
        self.order_number = Some(number);
        self.events.clear();
        self.raise_placed();
        self
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn raise_placed(&mut self) {
        if let Some(order_number) = self.order_number.clone() {
            self.raise_event(DomainEvent::Order(OrderEvent::Placed {
                order_id: self.id.to_string(), order_number, email: self.email.clone(),
                total: self.total.amount(), currency: self.total.currency().to_string(),
            }));
        }
    }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("No items in cart")]
    NoItems,
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Currency mismatch")]
    CurrencyMismatch,
    #[error("Order number already assigned")]
    NumberAlreadyAssigned,
    #[error("Unknown order status `{0}`")]
    UnknownStatus(String),
}

impl From<MoneyError> for OrderError {
    fn from(_: MoneyError) -> Self { OrderError::CurrencyMismatch }
}
