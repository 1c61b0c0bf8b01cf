// src/models/payment.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// SUCCESS, FAILED and CANCELLED admit no further transition.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

// One settlement attempt of a bill through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub flat_id: i64,
    pub society_id: i64,
    pub bill_id: Option<i64>,
    #[schema(value_type = String, example = "500.00")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_month: DateTime<Utc>,
    pub payment_date: DateTime<Utc>,
    #[schema(example = "TXN-8f14e45fceea167a5a36dedd4bea2543")]
    pub tran_id: String,
    #[serde(skip_serializing)]
    pub session_key: Option<String>,
    #[schema(value_type = Object)]
    pub transaction_details: Option<serde_json::Value>,
    #[schema(example = "BDT")]
    pub currency: String,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentPayload {
    #[validate(range(min = 1, message = "billId is required"))]
    pub bill_id: i64,

    #[schema(value_type = String, example = "500.00")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    #[schema(example = "https://sandbox.sslcommerz.com/EasyCheckOut/testcde...")]
    pub payment_url: String,
    pub payment_id: i64,
    pub tran_id: String,
}

/// Values written back onto a payment-like row once its callback is reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub transaction_details: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_open() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn wire_names_match_store_enum() {
        let json = serde_json::to_string(&PaymentStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!(PaymentStatus::Success.as_str(), "SUCCESS");
    }
}
