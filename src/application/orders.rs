//! Order placement and numbering.
//!
//! The generator alone does not make numbers unique. Every write goes through
//! [`persist_with_retry`]: one attempt with the timestamp candidate, one with a
//! random suffix, then [`EcommerceError::Conflict`].

use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::aggregates::{Checkout, Order};
use crate::domain::value_objects::{OrderNumber, OrderNumberGenerator, CONFLICT_SUFFIX_RANGE};
use crate::repository::{OrderRepository, StoreError};
use crate::{EcommerceError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub assigned: usize,
    pub suffixed: usize,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    numbers: OrderNumberGenerator,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, clock: Arc<dyn Clock>, numbers: OrderNumberGenerator) -> Self {
        Self { repo, clock, numbers }
    }

    /// Numbers and stores a new order. The returned order still holds its
    /// `Placed` event for the caller to publish.
    pub async fn place_order(&self, checkout: Checkout) -> Result<Order> {
        let now = self.clock.now();
        let candidate = self.numbers.generate(now);
        let base = Order::create(candidate.clone(), checkout, now)?;

        let repo = Arc::clone(&self.repo);
        let (number, suffixed) = persist_with_retry(candidate, |n| {
            let repo = Arc::clone(&repo);
            let order = base.clone().with_candidate_number(n);
            async move { repo.insert(&order).await }.boxed()
        })
        .await?;

        info!(order_id = %base.id(), order_number = %number, suffixed, total = %base.total(), "order placed");
        Ok(base.with_candidate_number(number))
    }

    pub async fn find_by_number(&self, raw: &str) -> Result<Order> {
        let number = OrderNumber::parse(raw)?;
        self.repo.find_by_number(&number).await?.ok_or(EcommerceError::OrderNotFound)
    }

    /// Newest first. `page` starts at 1; `per_page` is clamped to 1..=100.
    pub async fn list_orders(&self, page: Option<u32>, per_page: Option<u32>) -> Result<(Vec<Order>, i64, u32)> {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(per_page);
        let (orders, total) = self.repo.list(i64::from(per_page), offset).await?;
        Ok((orders, total, page))
    }

    /// Assigns numbers to legacy orders from their original creation time.
    pub async fn backfill_order_numbers(&self) -> Result<BackfillReport> {
        let pending = self.repo.without_order_number().await?;
        let mut report = BackfillReport { scanned: pending.len(), ..Default::default() };
        info!(count = pending.len(), "found orders without order number");

        for order in pending {
            let id = order.id();
            let candidate = self.numbers.generate(order.created_at());
            let repo = Arc::clone(&self.repo);
            let (number, suffixed) = persist_with_retry(candidate, |n| {
                let repo = Arc::clone(&repo);
                async move { repo.assign_order_number(id, &n).await }.boxed()
            })
            .await?;
            info!(order_id = %id, order_number = %number, suffixed, "assigned order number");
            report.assigned += 1;
            if suffixed { report.suffixed += 1; }
        }

        info!(?report, "order number backfill complete");
        Ok(report)
    }
}

/// Runs `write` with `candidate`, and once more with a suffixed candidate if
/// the first write hit the order-number unique index. Any other error,
/// including a unique violation on another constraint, is returned as is.
/// Returns the accepted number and whether it carries a suffix.
async fn persist_with_retry<F>(candidate: OrderNumber, mut write: F) -> Result<(OrderNumber, bool)>
where
    F: FnMut(OrderNumber) -> BoxFuture<'static, std::result::Result<(), StoreError>>,
{
    match write(candidate.clone()).await {
        Ok(()) => return Ok((candidate, false)),
        Err(e) if e.is_order_number_conflict() => {}
        Err(e) => return Err(e.into()),
    }

    let retry = candidate.with_suffix(rand::thread_rng().gen_range(CONFLICT_SUFFIX_RANGE));
    warn!(%candidate, %retry, "order number taken, retrying with suffix");
    match write(retry.clone()).await {
        Ok(()) => Ok((retry, true)),
        Err(e) if e.is_order_number_conflict() => Err(EcommerceError::Conflict(candidate)),
        Err(e) => Err(e.into()),
    }
}
