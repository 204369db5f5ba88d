use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    NewPayment, Order, OrderItem, OrderStatus, OrderView, Payment, PaymentStatus, Product,
};
use crate::error::AppError;

use super::{OrderStore, OrderUnitOfWork, PaymentStore};

// ============================================================================
// In-Memory Store - Test Double for the Postgres Repositories
// ============================================================================
//
// A unit of work takes the store-wide mutex for its whole lifetime and edits
// a scratch copy of the state. Commit writes the scratch back; dropping the
// handle discards it. Holding the guard until commit/drop reproduces the
// blocking behavior of row locks coarsely (one writer at a time), which is
// what the concurrency tests need.
//
// ============================================================================

#[derive(Default, Clone)]
struct MemState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    payments: HashMap<Uuid, Payment>,
}

#[derive(Default, Clone)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product row. Test setup only; bypasses all locking.
    pub async fn insert_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        let product = Product {
            id,
            name: name.to_string(),
            description: None,
            price,
            stock,
            category_id: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.products.insert(id, product);
        id
    }

    pub async fn product(&self, id: Uuid) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn set_product_price(&self, id: Uuid, price: Decimal) {
        if let Some(product) = self.state.lock().await.products.get_mut(&id) {
            product.price = price;
        }
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn payment(&self, id: Uuid) -> Option<Payment> {
        self.state.lock().await.payments.get(&id).cloned()
    }
}

#[async_trait]
impl OrderStore for MemStore {
    async fn begin(&self) -> Result<Box<dyn OrderUnitOfWork>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let scratch = guard.clone();
        Ok(Box::new(MemUnitOfWork { guard, scratch }))
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn order_view(&self, id: Uuid) -> Result<Option<OrderView>, AppError> {
        let state = self.state.lock().await;
        let Some(order) = state.orders.get(&id).cloned() else {
            return Ok(None);
        };

        let items = state
            .items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();

        Ok(Some(OrderView { order, items }))
    }

    async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<OrderView>, AppError> {
        let state = self.state.lock().await;

        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = state
                    .items
                    .iter()
                    .filter(|item| item.order_id == order.id)
                    .cloned()
                    .collect();
                OrderView { order, items }
            })
            .collect())
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(AppError::NotFound("order"))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }
}

struct MemUnitOfWork {
    guard: OwnedMutexGuard<MemState>,
    scratch: MemState,
}

#[async_trait]
impl OrderUnitOfWork for MemUnitOfWork {
    async fn insert_order(&mut self, customer_id: Uuid) -> Result<Order, AppError> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            status: OrderStatus::Pending,
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.scratch.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn product_for_update(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.scratch.products.get(&id).cloned())
    }

    async fn insert_item(
        &mut self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<OrderItem, AppError> {
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
            unit_price,
        };
        self.scratch.items.push(item.clone());
        Ok(item)
    }

    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> Result<(), AppError> {
        let product = self
            .scratch
            .products
            .get_mut(&product_id)
            .ok_or(AppError::NotFound("product"))?;
        product.stock -= quantity;
        Ok(())
    }

    async fn set_total(&mut self, order_id: Uuid, total: Decimal) -> Result<(), AppError> {
        let order = self
            .scratch
            .orders
            .get_mut(&order_id)
            .ok_or(AppError::NotFound("order"))?;
        order.total_amount = total;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        *self.guard = self.scratch;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for MemStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let mut state = self.state.lock().await;

        let duplicate = state
            .payments
            .values()
            .any(|p| p.provider_payment_id == payment.provider_payment_id);
        if duplicate {
            return Err(AppError::Conflict("duplicate record".to_string()));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: payment.order_id,
            provider: payment.provider,
            provider_payment_id: payment.provider_payment_id,
            amount: payment.amount,
            currency: payment.currency,
            status: PaymentStatus::RequiresAction,
            created_at: Utc::now(),
        };
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn payment_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.provider_payment_id == provider_payment_id)
            .cloned())
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or(AppError::NotFound("payment"))?;
        payment.status = status;
        Ok(())
    }
}
