use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Error Taxonomy
// ============================================================================
//
// Closed set of failure kinds for the whole service. Kinds map to transport
// status codes only at the HTTP boundary (ResponseError impl below); the
// services and repositories never reason about HTTP.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Access to this resource is forbidden")]
    Forbidden,

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid },

    #[error("{0}")]
    Conflict(String),

    #[error("Timed out waiting for a row lock")]
    Timeout,

    #[error("Payment gateway error: {0}")]
    ExternalService(String),

    #[error("Database error: {message}")]
    Database { message: String, transient: bool },
}

impl AppError {
    /// Stable machine-readable kind, exposed in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::Conflict(_) => "conflict",
            AppError::Timeout => "timeout",
            AppError::ExternalService(_) => "external_service",
            AppError::Database { .. } => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                // lock_not_available: lock_timeout expired while waiting
                Some("55P03") => return AppError::Timeout,
                // unique_violation
                Some("23505") => {
                    return AppError::Conflict("duplicate record".to_string());
                }
                // serialization_failure / deadlock_detected: safe to retry
                Some("40001") | Some("40P01") => {
                    return AppError::Database {
                        message: db_err.message().to_string(),
                        transient: true,
                    };
                }
                _ => {}
            }
        }

        AppError::Database {
            message: err.to_string(),
            transient: false,
        }
    }
}

impl IsTransient for AppError {
    fn is_transient(&self) -> bool {
        matches!(self, AppError::Database { transient: true, .. })
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InsufficientStock { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail stays in the logs, never in the response body.
        let message = match self {
            AppError::Database { message, .. } => {
                tracing::error!(error = %message, "Internal database error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("order").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::InsufficientStock {
                product_id: Uuid::new_v4()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::Timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_only_transient_database_errors_retry() {
        let transient = AppError::Database {
            message: "deadlock detected".into(),
            transient: true,
        };
        let permanent = AppError::Database {
            message: "relation missing".into(),
            transient: false,
        };

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(!AppError::Timeout.is_transient());
        assert!(!AppError::InsufficientStock {
            product_id: Uuid::new_v4()
        }
        .is_transient());
    }

    #[test]
    fn test_database_detail_not_exposed() {
        let err = AppError::Database {
            message: "password authentication failed for user".into(),
            transient: false,
        };
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(AppError::Forbidden.kind(), "forbidden");
        assert_eq!(AppError::Timeout.kind(), "timeout");
        assert_eq!(
            AppError::InsufficientStock {
                product_id: Uuid::new_v4()
            }
            .kind(),
            "insufficient_stock"
        );
    }
}
