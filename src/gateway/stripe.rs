use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

use super::{GatewayIntent, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Stripe-Style Gateway
// ============================================================================
//
// Webhook signatures follow Stripe's scheme: the header carries
// `t=<unix>,v1=<hex hmac>` and the signature covers `{t}.{raw body}` keyed
// with the webhook secret. Timestamps outside the tolerance window are
// rejected even with a valid signature, so captured deliveries cannot be
// replayed later.
//
// Intent creation mints the provider id and client secret locally. The trait
// method is the seam where a real SDK/API call goes; the ids it produces
// have the same shape the gateway would return.
//
// ============================================================================

/// Maximum accepted age of a webhook timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeGateway {
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(webhook_secret: &str) -> Self {
        Self {
            webhook_secret: webhook_secret.to_string(),
        }
    }

    fn expected_signature(&self, timestamp: &str, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(
        &self,
        order_id: Uuid,
        amount_minor: i64,
        currency: &str,
    ) -> Result<GatewayIntent, AppError> {
        let provider_payment_id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{}_secret_{}", provider_payment_id, Uuid::new_v4().simple());

        tracing::info!(
            order_id = %order_id,
            provider_payment_id = %provider_payment_id,
            amount_minor = amount_minor,
            currency = currency,
            "Created payment intent"
        );

        Ok(GatewayIntent {
            provider_payment_id,
            client_secret,
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, AppError> {
        let mut timestamp = None;
        let mut signature = None;

        for part in signature_header.split(',') {
            match part.split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            AppError::Validation("webhook signature header missing timestamp".to_string())
        })?;
        let signature = signature.ok_or_else(|| {
            AppError::Validation("webhook signature header missing signature".to_string())
        })?;

        let timestamp_secs: i64 = timestamp.parse().map_err(|_| {
            AppError::Validation("webhook signature timestamp is not a number".to_string())
        })?;

        let age = chrono::Utc::now().timestamp() - timestamp_secs;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Ok(false);
        }

        let Ok(provided) = hex::decode(signature) else {
            return Ok(false);
        };

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        // Constant-time comparison.
        Ok(mac.verify_slice(&provided).is_ok())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn gateway() -> StripeGateway {
        StripeGateway::new(SECRET)
    }

    fn sign(gateway: &StripeGateway, payload: &[u8], timestamp: &str) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(gateway.expected_signature(timestamp, payload))
        )
    }

    fn current_timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let gw = gateway();
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let header = sign(&gw, payload, &current_timestamp());

        assert!(gw.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let gw = gateway();
        let other = StripeGateway::new("wrong_secret");
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let header = sign(&other, payload, &current_timestamp());

        assert!(!gw.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn test_modified_payload_rejected() {
        let gw = gateway();
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let header = sign(&gw, payload, &current_timestamp());

        let tampered = b"{\"type\":\"payment_intent.succeeded\",\"extra\":true}";
        assert!(!gw.verify_webhook_signature(tampered, &header).unwrap());
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let gw = gateway();
        let payload = b"{}";
        // 10 minutes ago, beyond the 5-minute tolerance.
        let old = (chrono::Utc::now().timestamp() - 600).to_string();
        let header = sign(&gw, payload, &old);

        assert!(!gw.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn test_missing_timestamp_errors() {
        let gw = gateway();
        assert!(gw.verify_webhook_signature(b"{}", "v1=abcdef").is_err());
    }

    #[test]
    fn test_missing_signature_errors() {
        let gw = gateway();
        assert!(gw.verify_webhook_signature(b"{}", "t=1234567890").is_err());
    }

    #[test]
    fn test_malformed_header_errors() {
        let gw = gateway();
        assert!(gw.verify_webhook_signature(b"{}", "garbage").is_err());
        assert!(gw.verify_webhook_signature(b"{}", "").is_err());
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let gw = gateway();
        let header = format!("t={},v1=not-hex!", current_timestamp());
        assert!(!gw.verify_webhook_signature(b"{}", &header).unwrap());
    }

    #[tokio::test]
    async fn test_intent_ids_have_gateway_shape() {
        let gw = gateway();
        let intent = gw
            .create_intent(Uuid::new_v4(), 2550, "usd")
            .await
            .unwrap();

        assert!(intent.provider_payment_id.starts_with("pi_"));
        assert!(intent.client_secret.contains("_secret_"));
    }
}
