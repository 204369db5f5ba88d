use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Product - Catalog Entity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Fixed-point price (NUMERIC(10,2) in Postgres).
    pub price: Decimal,
    /// Units on hand. Only the placement transaction may decrement this.
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
