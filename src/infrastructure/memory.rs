//! Process-local order store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::OrderNumber;
use crate::repository::{OrderRepository, StoreError, ORDER_NUMBER_CONSTRAINT};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    by_number: HashMap<OrderNumber, Uuid>,
}

/// Keeps the same unique-number contract as the Postgres store.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    tables: RwLock<Tables>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.tables.read().await.orders.len() }

    /// Loads an already-persisted order as is, including legacy rows without a number.
    pub async fn seed(&self, order: Order) -> Result<(), StoreError> {
        self.tables.write().await.put(order)
    }
}

impl Tables {
    fn put(&mut self, order: Order) -> Result<(), StoreError> {
        if self.orders.contains_key(&order.id()) {
            return Err(StoreError::UniqueViolation { constraint: "orders_pkey".into() });
        }
        if let Some(n) = order.order_number() {
            if self.by_number.contains_key(n) {
                return Err(StoreError::UniqueViolation { constraint: ORDER_NUMBER_CONSTRAINT.into() });
            }
            self.by_number.insert(n.clone(), order.id());
        }
        self.orders.insert(order.id(), order);
        Ok(())
    }
}

fn stored(order: &Order) -> Order {
    let mut copy = order.clone();
    copy.take_events();
    copy
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.tables.write().await.put(stored(order))
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.by_number.get(number).and_then(|id| t.orders.get(id)).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Order>, i64), StoreError> {
        let t = self.tables.read().await;
        let mut orders: Vec<&Order> = t.orders.values().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        let page = orders.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).cloned().collect();
        Ok((page, t.orders.len() as i64))
    }

    async fn without_order_number(&self) -> Result<Vec<Order>, StoreError> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t.orders.values().filter(|o| o.order_number().is_none()).cloned().collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }

    async fn assign_order_number(&self, id: Uuid, number: &OrderNumber) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.by_number.get(number).is_some_and(|owner| *owner != id) {
            return Err(StoreError::UniqueViolation { constraint: ORDER_NUMBER_CONSTRAINT.into() });
        }
        let order = t.orders.get_mut(&id).ok_or(StoreError::Missing(id))?;
        order.assign_order_number(number.clone()).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        t.by_number.insert(number.clone(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Cart, CartItem, Checkout};
    use crate::domain::value_objects::Money;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order(number: &str) -> Order {
        let mut cart = Cart::new("USD");
        cart.add_item(CartItem {
            product_id: Uuid::now_v7(), name: "Cajon".into(), sku: None, quantity: 1, unit_price: Money::usd(Decimal::new(99, 0)),
        }).unwrap();
        let checkout = Checkout {
            email: "drummer@example.com".into(), customer_id: None, cart,
            shipping: Money::zero("USD"), discount: Money::zero("USD"), coupon_code: None, shipping_address: None,
        };
        Order::create(OrderNumber::parse(number).unwrap(), checkout, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(&order("11225100000021")).await.unwrap();
        let err = repo.insert(&order("11225100000021")).await.unwrap_err();
        assert!(err.is_order_number_conflict());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_number() {
        let repo = InMemoryOrderRepository::new();
        let o = order("11225100000021");
        repo.insert(&o).await.unwrap();
        let found = repo.find_by_number(o.order_number().unwrap()).await.unwrap().unwrap();
        assert_eq!(found.id(), o.id());
        assert!(repo.find_by_number(&OrderNumber::parse("42").unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_assign_missing_order() {
        let repo = InMemoryOrderRepository::new();
        let err = repo.assign_order_number(Uuid::now_v7(), &OrderNumber::parse("21").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }
}
