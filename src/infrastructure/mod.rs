//! Storage adapters for [`crate::repository::OrderRepository`].
pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;
