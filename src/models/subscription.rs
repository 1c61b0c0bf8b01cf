// src/models/subscription.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    models::{payment::PaymentStatus, society::FlatType},
};

// ---
// 1. Subscription (society-level paid access window)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub society_id: i64,
    pub user_id: Option<i64>,
    pub promo_id: Option<i64>,
    pub email: String,
    #[schema(value_type = String, example = "575.00")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub tran_id: String,
    #[serde(skip_serializing)]
    pub session_key: Option<String>,
    #[schema(value_type = Object)]
    pub transaction_details: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateSubscriptionPayload {
    #[validate(range(min = 1, message = "societyId is required"))]
    pub society_id: i64,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[schema(value_type = String, example = "575.00")]
    pub amount: Decimal,

    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedSubscription {
    pub payment_url: String,
    pub subscription_id: i64,
    pub tran_id: String,
}

// ---
// 2. RegistrationPayment (pre-account society registration fee)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayment {
    pub id: i64,
    pub email: String,
    pub society_id: Option<i64>,
    pub user_id: Option<i64>,
    pub promo_id: Option<i64>,
    #[schema(value_type = String, example = "575.00")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub tran_id: String,
    #[serde(skip_serializing)]
    pub session_key: Option<String>,
    #[schema(value_type = Object)]
    pub building_info: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub transaction_details: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlatInfo {
    #[validate(length(min = 1, message = "Flat number is required"))]
    pub number: String,
    pub flat_type: FlatType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildingInfo {
    #[validate(length(min = 1, message = "Building name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    #[validate(length(min = 1, message = "At least one flat is required"), nested)]
    pub flats: Vec<FlatInfo>,
    #[validate(length(min = 1, message = "At least one user email is required"))]
    pub user_emails: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRegistrationPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[schema(value_type = String, example = "575.00")]
    pub amount: Decimal,

    pub promo_code: Option<String>,

    pub society_id: Option<i64>,
    pub user_id: Option<i64>,

    #[validate(nested)]
    pub building_info: BuildingInfo,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedRegistration {
    pub payment_url: String,
    pub payment_id: i64,
    pub tran_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationHistoryQuery {
    pub email: Option<String>,
    pub society_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationQuote {
    #[schema(value_type = String, example = "500")]
    pub base_price: Decimal,
    #[schema(value_type = String, example = "75.00")]
    pub tax: Decimal,
    #[schema(value_type = String, example = "575.00")]
    pub total_price: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct Promo {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub discount_kind: String,
    pub discount: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_amount: Option<Decimal>,
}

impl Promo {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == "ACTIVE" && self.expiry_date.is_none_or(|expiry| expiry >= now)
    }

    /// Amount left to charge once the promo is applied, never below zero.
    pub fn apply(&self, amount: Decimal) -> Result<Decimal, AppError> {
        if let Some(min) = self.min_amount {
            if amount < min {
                return Err(AppError::InvalidInput(format!(
                    "Promo {} requires a minimum amount of {min}",
                    self.code
                )));
            }
        }

        let mut discount = match self.discount_kind.as_str() {
            "FIXED" => self.discount,
            _ => (amount * self.discount / Decimal::ONE_HUNDRED).round_dp(2),
        };
        if let Some(cap) = self.max_discount {
            discount = discount.min(cap);
        }

        Ok((amount - discount).max(Decimal::ZERO))
    }
}
