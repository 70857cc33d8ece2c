//! Application services.
pub mod orders;

pub use orders::{BackfillReport, OrderService};
