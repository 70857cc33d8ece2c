//! Postgres order store. `orders.order_number` carries the unique index the
//! placement retry relies on; see `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::{Address, LineItem, Order, OrderRecord, OrderStatus};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::repository::{OrderRepository, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: Option<String>, customer_id: Option<Uuid>, customer_email: String,
    status: String, currency: String, subtotal: Decimal, shipping: Decimal, discount: Decimal, total: Decimal,
    coupon_code: Option<String>, shipping_address: Option<Json<Address>>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow { id: Uuid, order_id: Uuid, product_id: Uuid, name: String, sku: Option<String>, quantity: i32, unit_price: Decimal }

const SELECT_ORDERS: &str = "SELECT id, order_number, customer_id, customer_email, status, currency, subtotal, shipping, discount, total, coupon_code, shipping_address, created_at, updated_at FROM orders";

#[derive(Clone)]
pub struct PgOrderRepository { pool: PgPool }

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>("SELECT id, order_id, product_id, name, sku, quantity, unit_price FROM order_items WHERE order_id = ANY($1) ORDER BY id")
            .bind(&ids).fetch_all(&self.pool).await?;
        let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for item in items { by_order.entry(item.order_id).or_default().push(item); }
        rows.into_iter().map(|r| {
            let items = by_order.remove(&r.id).unwrap_or_default();
            to_order(r, items)
        }).collect()
    }
}

fn to_order(r: OrderRow, items: Vec<OrderItemRow>) -> Result<Order, StoreError> {
    let order_number = r.order_number.as_deref().map(OrderNumber::parse).transpose()
        .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", r.id)))?;
    let status = r.status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt(format!("order {}: {e}", r.id)))?;
    let currency = r.currency.as_str();
    let items = items.into_iter().map(|i| {
        let quantity = u32::try_from(i.quantity).map_err(|_| StoreError::Corrupt(format!("line {} has quantity {}", i.id, i.quantity)))?;
        Ok(LineItem { id: i.id, product_id: i.product_id, name: i.name, sku: i.sku, quantity, unit_price: Money::new(i.unit_price, currency) })
    }).collect::<Result<Vec<_>, StoreError>>()?;
    Ok(Order::restore(OrderRecord {
        id: r.id, order_number, customer_id: r.customer_id, email: r.customer_email, status, items,
        subtotal: Money::new(r.subtotal, currency), shipping: Money::new(r.shipping, currency),
        discount: Money::new(r.discount, currency), total: Money::new(r.total, currency),
        coupon_code: r.coupon_code, shipping_address: r.shipping_address.map(|a| a.0),
        created_at: r.created_at, updated_at: r.updated_at,
    }))
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, order_number, customer_id, customer_email, status, currency, subtotal, shipping, discount, total, coupon_code, shipping_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(order.id()).bind(order.order_number().map(OrderNumber::as_str)).bind(order.customer_id()).bind(order.email())
            .bind(order.status().as_str()).bind(order.total().currency()).bind(order.subtotal().amount()).bind(order.shipping().amount())
            .bind(order.discount().amount()).bind(order.total().amount()).bind(order.coupon_code()).bind(order.shipping_address().map(Json))
            .bind(order.created_at()).bind(order.updated_at())
            .execute(&mut *tx).await?;
        for item in order.items() {
            let quantity = i32::try_from(item.quantity).map_err(|_| StoreError::Corrupt(format!("line {} quantity overflows", item.id)))?;
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, name, sku, quantity, unit_price) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                .bind(item.id).bind(order.id()).bind(item.product_id).bind(&item.name).bind(&item.sku).bind(quantity).bind(item.unit_price.amount())
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} WHERE order_number = $1"))
            .bind(number.as_str()).fetch_all(&self.pool).await?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Order>, i64), StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} ORDER BY created_at DESC LIMIT $1 OFFSET $2"))
            .bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        Ok((self.hydrate(rows).await?, total.0))
    }

    async fn without_order_number(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} WHERE order_number IS NULL ORDER BY created_at ASC"))
            .fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn assign_order_number(&self, id: Uuid, number: &OrderNumber) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET order_number = $2, updated_at = NOW() WHERE id = $1 AND order_number IS NULL")
            .bind(id).bind(number.as_str()).execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::Missing(id)); }
        Ok(())
    }
}
