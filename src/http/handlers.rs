use actix_web::{web, HttpRequest, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedCustomer;
use crate::domain::OrderLine;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::service::{OrderService, PaymentService};

// ============================================================================
// Request Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

pub async fn create_order(
    orders: web::Data<OrderService>,
    customer: AuthenticatedCustomer,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let view = orders.place_order(customer.0, &body.items).await?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn get_order(
    orders: web::Data<OrderService>,
    customer: AuthenticatedCustomer,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = orders.get_order(path.into_inner(), customer.0).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn list_my_orders(
    orders: web::Data<OrderService>,
    customer: AuthenticatedCustomer,
) -> Result<HttpResponse, AppError> {
    let views = orders.list_orders(customer.0).await?;
    Ok(HttpResponse::Ok().json(views))
}

pub async fn create_intent(
    payments: web::Data<PaymentService>,
    customer: AuthenticatedCustomer,
    body: web::Json<CreateIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let response = payments.create_intent(body.order_id, customer.0).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Takes the raw body: the gateway signature covers the exact bytes sent,
/// so the payload must not go through JSON extraction first.
pub async fn webhook(
    payments: web::Data<PaymentService>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    payments.handle_webhook(&body, signature).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "storefront"
    }))
}

pub async fn metrics(metrics: web::Data<Metrics>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

// ============================================================================
// Route Tests (in-memory store behind the real app)
// ============================================================================
