use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Payment - Local Mirror of a Gateway Payment Intent
// ============================================================================

/// Mirrors the gateway's payment-intent lifecycle. The gateway is the source
/// of truth; this record may lag briefly until the webhook arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresAction,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to persist a freshly created intent.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub provider: String,
    pub provider_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::RequiresAction).unwrap();
        assert_eq!(json, "\"requires_action\"");

        let status: PaymentStatus = serde_json::from_str("\"succeeded\"").unwrap();
        assert_eq!(status, PaymentStatus::Succeeded);
    }
}
