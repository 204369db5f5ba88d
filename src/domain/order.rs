use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

// ============================================================================
// Order Aggregate - Order, OrderItem, OrderStatus
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    /// Sum of item subtotals, fixed at creation time.
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Snapshot of the product price at purchase time. Later catalog price
    /// changes never touch this value.
    pub unit_price: Decimal,
}

/// One requested line of a new order, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// An order together with its items, as returned to the owning customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Reject malformed requests before any transaction opens.
pub fn validate_lines(lines: &[OrderLine]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Err(AppError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }

    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "invalid quantity {} for product {}",
                line.quantity, line.product_id
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
