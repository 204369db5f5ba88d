use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    NewPayment, Order, OrderItem, OrderStatus, OrderView, Payment, PaymentStatus, Product,
};
use crate::error::AppError;

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

// ============================================================================
// Repository Ports
// ============================================================================
//
// The placement algorithm runs against `OrderUnitOfWork`, a handle over one
// open transaction. Locks acquired through the handle are held until the
// handle commits or drops; dropping without commit rolls everything back.
// This keeps the algorithm a pure function over the handle, testable against
// the in-memory fake.
//
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Open a transaction for order placement.
    async fn begin(&self) -> Result<Box<dyn OrderUnitOfWork>, AppError>;

    async fn order(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    /// Order with nested items.
    async fn order_view(&self, id: Uuid) -> Result<Option<OrderView>, AppError>;

    /// All orders for a customer, newest first, with nested items.
    async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<OrderView>, AppError>;

    /// Fails with `NotFound` if the order does not exist.
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError>;
}

#[async_trait]
pub trait OrderUnitOfWork: Send {
    /// Insert a pending order with a zero total placeholder.
    async fn insert_order(&mut self, customer_id: Uuid) -> Result<Order, AppError>;

    /// Read a product under an exclusive row lock held until commit/rollback.
    async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn insert_item(
        &mut self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<OrderItem, AppError>;

    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> Result<(), AppError>;

    async fn set_total(&mut self, order_id: Uuid, total: Decimal) -> Result<(), AppError>;

    /// Make every change in this unit of work durable. Dropping the handle
    /// without calling this rolls back instead.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with `Conflict` on a duplicate provider payment id.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, AppError>;

    async fn payment_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError>;

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<(), AppError>;
}
