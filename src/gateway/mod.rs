use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

pub mod stripe;

pub use stripe::StripeGateway;

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// A freshly created payment intent, as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    /// The gateway's identifier for the intent (e.g. "pi_...").
    pub provider_payment_id: String,
    /// Client-facing secret needed to complete the payment.
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Create a payment intent for `amount_minor` minor currency units
    /// (cents). Gateway failures surface as `ExternalService`; nothing is
    /// persisted locally until this returns.
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount_minor: i64,
        currency: &str,
    ) -> Result<GatewayIntent, AppError>;

    /// Verify a webhook signature header against the raw request body.
    /// Returns Ok(false) for a well-formed header that does not match;
    /// malformed headers are an error.
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, AppError>;
}
