//! Instrument Store order service
//!
//! Order placement for a musical-instrument storefront.
//!
//! ## Features
//! - Order numbers derived from the store's local time (`Asia/Ho_Chi_Minh`)
//! - Conflict-tolerant order placement over a unique index
//! - Backfill of numbers for legacy orders
//! - Order lookup by number and paginated listing

use thiserror::Error;

pub mod api;
pub mod application;
pub mod clock;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod repository;

pub use application::{BackfillReport, OrderService};
pub use config::Config;
pub use domain::value_objects::{generate, OrderNumber, OrderNumberFormat, OrderNumberGenerator};
pub use repository::{OrderRepository, StoreError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    /// Timezone data or another setting is unusable; order creation must abort.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The candidate and its suffixed retry were both taken.
    #[error("Order number {0} still conflicts after retry")]
    Conflict(OrderNumber),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Invalid order number `{0}`")]
    InvalidOrderNumber(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<domain::aggregates::OrderError> for EcommerceError {
    fn from(e: domain::aggregates::OrderError) -> Self { EcommerceError::InvalidOrder(e.to_string()) }
}

impl From<domain::aggregates::CartError> for EcommerceError {
    fn from(e: domain::aggregates::CartError) -> Self { EcommerceError::InvalidOrder(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
