//! Aggregates module
pub mod order;
pub mod cart;

pub use order::{Order, OrderError, OrderRecord, OrderStatus, LineItem, Address, Checkout};
pub use cart::{Cart, CartError, CartItem};
