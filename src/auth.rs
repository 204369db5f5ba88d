use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Customer Bearer Tokens
// ============================================================================
//
// Token format: `<customer uuid>.<hex hmac-sha256(uuid, auth secret)>`.
// Enough to establish which customer a request acts as; account
// registration, login, and session management live outside this service.
//
// ============================================================================

/// App-data wrapper for the token-signing secret.
pub struct AuthSecret(pub String);

pub fn issue_token(customer_id: Uuid, secret: &str) -> String {
    let id = customer_id.to_string();
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(id.as_bytes());
    format!("{}.{}", id, hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_token(token: &str, secret: &str) -> Option<Uuid> {
    let (id, signature) = token.split_once('.')?;
    let customer_id = Uuid::parse_str(id).ok()?;
    let provided = hex::decode(signature).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&provided).ok()?;

    Some(customer_id)
}

/// Extractor for the authenticated customer behind a request.
pub struct AuthenticatedCustomer(pub Uuid);

impl FromRequest for AuthenticatedCustomer {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = (|| {
            let secret = req
                .app_data::<web::Data<AuthSecret>>()
                .ok_or(AppError::Unauthorized)?;

            let token = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or(AppError::Unauthorized)?;

            verify_token(token, &secret.0)
                .map(AuthenticatedCustomer)
                .ok_or(AppError::Unauthorized)
        })();

        ready(result)
    }
}
