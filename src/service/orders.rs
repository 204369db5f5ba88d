use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{validate_lines, OrderLine, OrderStatus, OrderView};
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::repo::{OrderStore, OrderUnitOfWork};
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// Order Placement Service
// ============================================================================
//
// Placement is all-or-nothing: the order row, its items, and every stock
// decrement commit together or not at all. Each product is read under an
// exclusive row lock before its stock is checked, so two concurrent orders
// cannot both observe the same pre-decrement value.
//
// Products are locked in caller line order. Two multi-item orders locking
// the same products in opposite orders can deadlock; the storage engine
// aborts one of them and `retry_on_transient` re-runs it from scratch.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            retry: RetryConfig::default(),
        }
    }

    /// Create one order with its items, decrementing stock for each line.
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        lines: &[OrderLine],
    ) -> Result<OrderView, AppError> {
        // Malformed requests never open a transaction.
        validate_lines(lines)?;

        let started = Instant::now();

        let result: Result<OrderView, AppError> =
            retry_on_transient(self.retry.clone(), |attempt| {
            let store = self.store.clone();
            async move {
                if attempt > 1 {
                    tracing::debug!(attempt = attempt, "Re-running placement after abort");
                }

                let mut uow = store.begin().await?;
                let view = place_order_lines(uow.as_mut(), customer_id, lines).await?;
                uow.commit().await?;
                Ok(view)
            }
        })
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(view) => {
                self.metrics.record_placement(elapsed, Ok(()));
                tracing::info!(
                    order_id = %view.order.id,
                    customer_id = %customer_id,
                    items = view.items.len(),
                    total = %view.order.total_amount,
                    "Order placed"
                );
            }
            Err(err) => {
                self.metrics.record_placement(elapsed, Err(err.kind()));
            }
        }

        result
    }

    /// Fetch one order for its owner. Missing ids are `NotFound`; existing
    /// orders owned by someone else are `Forbidden`, so non-owners cannot
    /// probe which ids exist.
    pub async fn get_order(&self, id: Uuid, requester: Uuid) -> Result<OrderView, AppError> {
        let view = self
            .store
            .order_view(id)
            .await?
            .ok_or(AppError::NotFound("order"))?;

        if view.order.customer_id != requester {
            return Err(AppError::Forbidden);
        }

        Ok(view)
    }

    /// All orders for the customer, newest first.
    pub async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<OrderView>, AppError> {
        self.store.orders_for_customer(customer_id).await
    }

    /// Transition an order to paid. Driven by the payment webhook; setting
    /// an already-paid order to paid again is a no-op by design.
    pub async fn mark_paid(&self, order_id: Uuid) -> Result<(), AppError> {
        self.store.set_order_status(order_id, OrderStatus::Paid).await
    }
}

/// The placement algorithm as a pure function over one open unit of work.
/// The caller owns commit/rollback; any error here must roll the whole
/// transaction back.
pub async fn place_order_lines(
    uow: &mut dyn OrderUnitOfWork,
    customer_id: Uuid,
    lines: &[OrderLine],
) -> Result<OrderView, AppError> {
    let mut order = uow.insert_order(customer_id).await?;

    let mut items = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let product = uow
            .product_for_update(line.product_id)
            .await?
            .ok_or(AppError::NotFound("product"))?;

        if product.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
            });
        }

        total += product.price * Decimal::from(line.quantity);

        let item = uow
            .insert_item(order.id, product.id, line.quantity, product.price)
            .await?;
        uow.decrement_stock(product.id, line.quantity).await?;
        items.push(item);
    }

    uow.set_total(order.id, total).await?;
    order.total_amount = total;

    Ok(OrderView { order, items })
}

// ============================================================================
// Unit Tests (against the in-memory store)
// ============================================================================
