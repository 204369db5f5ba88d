use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{NewPayment, PaymentStatus};
use crate::error::AppError;
use crate::gateway::PaymentGateway;
use crate::metrics::Metrics;
use crate::repo::PaymentStore;
use crate::service::OrderService;

// ============================================================================
// Payment Intent Service + Webhook Handler
// ============================================================================
//
// Intent creation: ownership-checked order lookup, gateway call, then the
// local Payment row. A gateway failure persists nothing.
//
// Webhook application: signature first, state second. Invalid signatures
// reject the delivery before any read or write. The gateway is the source of
// truth, so events for provider payment ids we have no row for are logged
// and acknowledged, not retried.
//
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_id: Uuid,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    /// The gateway's payment intent id ("pi_...").
    id: String,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    metrics: Arc<Metrics>,
    currency: String,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        metrics: Arc<Metrics>,
        currency: &str,
    ) -> Self {
        Self {
            payments,
            orders,
            gateway,
            metrics,
            currency: currency.to_string(),
        }
    }

    /// Create a gateway payment intent for an order and persist the local
    /// Payment record mirroring it.
    pub async fn create_intent(
        &self,
        order_id: Uuid,
        requester: Uuid,
    ) -> Result<PaymentIntentResponse, AppError> {
        let view = self.orders.get_order(order_id, requester).await?;
        let amount = view.order.total_amount;

        let intent = self
            .gateway
            .create_intent(order_id, to_minor_units(amount)?, &self.currency)
            .await?;

        let payment = self
            .payments
            .insert_payment(NewPayment {
                order_id,
                provider: self.gateway.provider().to_string(),
                provider_payment_id: intent.provider_payment_id,
                amount,
                currency: self.currency.clone(),
            })
            .await?;

        self.metrics.payment_intents_created.inc();

        Ok(PaymentIntentResponse {
            payment_id: payment.id,
            client_secret: intent.client_secret,
        })
    }

    /// Apply one signed webhook delivery. Idempotent for redeliveries: the
    /// same succeeded event applied twice re-sets the same statuses and
    /// changes nothing else.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), AppError> {
        let header = signature_header.ok_or_else(|| {
            AppError::Validation("missing webhook signature header".to_string())
        })?;

        if !self.gateway.verify_webhook_signature(payload, header)? {
            return Err(AppError::Validation(
                "invalid webhook signature".to_string(),
            ));
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|_| AppError::Validation("malformed webhook payload".to_string()))?;

        let Some(status) = intent_status(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "Ignoring non-intent webhook event");
            self.metrics.record_webhook(&event.event_type, "ignored");
            return Ok(());
        };

        let Some(payment) = self
            .payments
            .payment_by_provider_id(&event.data.object.id)
            .await?
        else {
            // The gateway is authoritative; a locally unknown id is not an
            // error worth failing the delivery over.
            tracing::info!(
                provider_payment_id = %event.data.object.id,
                event_type = %event.event_type,
                "Webhook references unknown payment, ignoring"
            );
            self.metrics.record_webhook(&event.event_type, "unknown_payment");
            return Ok(());
        };

        self.payments
            .set_payment_status(payment.id, status.clone())
            .await?;

        if status == PaymentStatus::Succeeded {
            self.orders.mark_paid(payment.order_id).await?;
        }

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            event_type = %event.event_type,
            "Applied webhook event"
        );
        self.metrics.record_webhook(&event.event_type, "applied");

        Ok(())
    }
}

/// Map a gateway event type onto the local payment lifecycle. Events outside
/// the payment-intent lifecycle return None and are ignored.
fn intent_status(event_type: &str) -> Option<PaymentStatus> {
    match event_type {
        "payment_intent.succeeded" => Some(PaymentStatus::Succeeded),
        "payment_intent.payment_failed" => Some(PaymentStatus::Failed),
        "payment_intent.canceled" => Some(PaymentStatus::Canceled),
        _ => None,
    }
}

/// Fixed-point major units to integral minor units (cents).
fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    (amount * Decimal::from(100))
        .to_i64()
        .ok_or_else(|| AppError::Validation("order total out of range".to_string()))
}

// ============================================================================
// Unit Tests (against the in-memory store and a real gateway instance)
// ============================================================================
