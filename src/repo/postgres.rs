use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    NewPayment, Order, OrderItem, OrderStatus, OrderView, Payment, PaymentStatus, Product,
};
use crate::error::AppError;

use super::{OrderStore, OrderUnitOfWork, PaymentStore};

// ============================================================================
// Postgres Repositories
// ============================================================================
//
// `product_for_update` uses SELECT ... FOR UPDATE, so two placements touching
// the same product serialize on the row lock: the second transaction blocks
// until the first commits or rolls back, then re-reads the current stock.
// `SET LOCAL lock_timeout` bounds that wait; expiry surfaces as
// `AppError::Timeout` via the 55P03 mapping in `error.rs`.
//
// Exercising the expiry itself requires a live Postgres holding a real row
// lock; the suite covers the 55P03 -> Timeout mapping in `error.rs` and
// everything above this layer through the in-memory store.
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, customer_id, status, total_amount, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    async fn items_for_order(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, unit_price
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn OrderUnitOfWork>, AppError> {
        let mut tx = self.pool.begin().await?;

        // lock_timeout cannot be bound as a parameter; the value comes from
        // config, not from request input.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn order_view(&self, id: Uuid) -> Result<Option<OrderView>, AppError> {
        let Some(order) = self.order(id).await? else {
            return Ok(None);
        };

        let items = self.items_for_order(order.id).await?;
        Ok(Some(OrderView { order, items }))
    }

    async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<OrderView>, AppError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE customer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        // One items query for the whole listing, grouped in memory.
        let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, unit_price
             FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderView { order, items }
            })
            .collect())
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("order"));
        }

        Ok(())
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderUnitOfWork for PgUnitOfWork {
    async fn insert_order(&mut self, customer_id: Uuid) -> Result<Order, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (id, customer_id, status, total_amount)
             VALUES ($1, $2, 'pending', 0)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, stock, category_id, created_at
             FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn insert_item(
        &mut self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<OrderItem, AppError> {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, order_id, product_id, quantity, unit_price",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_total(&mut self, order_id: Uuid, total: Decimal) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET total_amount = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(total)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, order_id, provider, provider_payment_id, amount, currency, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'requires_action')
             RETURNING id, order_id, provider, provider_payment_id, amount, currency, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payment.order_id)
        .bind(&payment.provider)
        .bind(&payment.provider_payment_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn payment_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, provider, provider_payment_id, amount, currency, status, created_at
             FROM payments WHERE provider_payment_id = $1",
        )
        .bind(provider_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("payment"));
        }

        Ok(())
    }
}
