//! Cart Aggregate

use crate::domain::value_objects::Money;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { items: vec![], subtotal: Money::zero(currency), currency: currency.to_uppercase() }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if item.unit_price.is_negative() { return Err(CartError::NegativePrice); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Price currency does not match cart")]
    CurrencyMismatch,
    #[error("Price must not be negative")]
    NegativePrice,
}
