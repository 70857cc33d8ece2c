//! Storage port for orders.
//!
//! Implementations must reject a write whose order number is already held by
//! another order with [`StoreError::UniqueViolation`]; the service layer relies
//! on that to resolve concurrent checkouts.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::OrderNumber;

/// Unique constraint on `orders.order_number`, named in `migrations/`.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Order {0} not found")]
    Missing(Uuid),

    #[error("Corrupt order row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Only a clash on the order number is worth retrying with a new number.
    pub fn is_order_number_conflict(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == ORDER_NUMBER_CONSTRAINT)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let unique = e.as_database_error().filter(|d| d.is_unique_violation()).map(|d| d.constraint().unwrap_or("unique").to_string());
        match unique {
            Some(constraint) => StoreError::UniqueViolation { constraint },
            None => StoreError::Database(e),
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with its line items, all or nothing.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    /// Newest first, with the total row count.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Order>, i64), StoreError>;

    /// Legacy orders lacking a number, oldest first.
    async fn without_order_number(&self) -> Result<Vec<Order>, StoreError>;

    async fn assign_order_number(&self, id: Uuid, number: &OrderNumber) -> Result<(), StoreError>;
}
