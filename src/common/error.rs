use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::gateway::GatewayError;

// Crate-wide error type, rendered as `{ "error": ... }` JSON.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Payment amount must be greater than zero")]
    InvalidAmount,

    #[error("{0}")]
    NotFound(String),

    #[error("Bills already generated for this month")]
    BillsAlreadyGenerated,

    #[error("Bill {0} is already paid")]
    BillAlreadyPaid(i64),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("Society subscription is not active")]
    SocietyInactive,

    #[error("Payment gateway configuration missing: {0}")]
    ConfigurationError(String),

    #[error("Payment gateway error: {0}")]
    UpstreamGateway(#[from] GatewayError),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    // Anything unexpected, with context from `anyhow`.
    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) | AppError::InvalidAmount => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) | AppError::UnknownTransaction(_) => StatusCode::NOT_FOUND,
            AppError::BillsAlreadyGenerated | AppError::BillAlreadyPaid(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::SocietyInactive => StatusCode::PAYMENT_REQUIRED,
            AppError::UpstreamGateway(GatewayError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationError(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamGateway(GatewayError::Timeout | GatewayError::Transport(_))
        )
    }

    /// Unique-key violations raised by the store surface as conflicts.
    pub fn from_unique_violation(e: sqlx::Error, conflict: AppError) -> AppError {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return conflict;
            }
        }
        AppError::DatabaseError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retryable = self.is_retryable();

        let error_message = match self {
            // Field-level validation details.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (status, body).into_response();
            }
            ref e if status.is_server_error() && !matches!(e, AppError::UpstreamGateway(_)) => {
                tracing::error!("Internal server error: {:?}", e);
                if let AppError::ConfigurationError(_) = e {
                    e.to_string()
                } else {
                    "An unexpected error occurred.".to_string()
                }
            }
            ref e => e.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "retryable": retryable,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(AppError::BillsAlreadyGenerated.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::BillAlreadyPaid(3).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn gateway_timeout_is_retryable() {
        let err = AppError::UpstreamGateway(GatewayError::Timeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.is_retryable());

        let rejected = AppError::UpstreamGateway(GatewayError::Rejected("bad store".into()));
        assert_eq!(rejected.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn unknown_transaction_is_client_error() {
        let err = AppError::UnknownTransaction("TXN-1".into());
        assert!(err.status_code().is_client_error());
        assert_eq!(err.to_string(), "Unknown transaction: TXN-1");
    }
}
