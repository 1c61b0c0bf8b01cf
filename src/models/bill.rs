// src/models/bill.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{
    charges::ChargeLine,
    payment::PaymentStatus,
    society::FlatType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "bill_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Pending,
    Paid,
}

// Row as stored. The two charge lists are frozen at generation time.
#[derive(Debug, Clone, FromRow)]
pub struct Bill {
    pub id: i64,
    pub user_id: i64,
    pub flat_id: i64,
    pub society_id: i64,
    pub bill_month: DateTime<Utc>,
    pub common_charges: Json<Vec<ChargeLine>>,
    pub flat_charges: Json<Vec<ChargeLine>>,
    pub total_amount: Decimal,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Display projections ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillFlatInfo {
    #[schema(example = "A-101")]
    pub number: String,
    pub flat_type: FlatType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillSocietyInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillPaymentInfo {
    pub id: i64,
    #[serde(skip)]
    pub bill_id: i64,
    #[schema(value_type = String, example = "500.00")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    pub tran_id: String,
}

// Bill joined with flat number/type and society name, as the listing queries return it.
#[derive(Debug, Clone, FromRow)]
pub struct BillRow {
    #[sqlx(flatten)]
    pub bill: Bill,
    pub flat_number: String,
    pub flat_type: FlatType,
    pub society_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    pub id: i64,
    pub user_id: i64,
    pub flat_id: i64,
    pub society_id: i64,
    pub bill_month: DateTime<Utc>,
    pub status: BillStatus,
    #[schema(value_type = String, example = "500.00")]
    pub total_amount: Decimal,
    pub common_charges: Vec<ChargeLine>,
    pub flat_charges: Vec<ChargeLine>,
    pub flat: BillFlatInfo,
    pub society: BillSocietyInfo,
    pub payments: Vec<BillPaymentInfo>,
}

impl BillView {
    pub fn from_row(row: BillRow, payments: Vec<BillPaymentInfo>) -> Self {
        let BillRow {
            bill,
            flat_number,
            flat_type,
            society_name,
        } = row;

        Self {
            id: bill.id,
            user_id: bill.user_id,
            flat_id: bill.flat_id,
            society_id: bill.society_id,
            bill_month: bill.bill_month,
            status: bill.status,
            total_amount: bill.total_amount,
            common_charges: bill.common_charges.0,
            flat_charges: bill.flat_charges.0,
            flat: BillFlatInfo {
                number: flat_number,
                flat_type,
            },
            society: BillSocietyInfo { name: society_name },
            payments,
        }
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBillsPayload {
    #[validate(range(min = 1, message = "societyId is required"))]
    #[schema(example = 7)]
    pub society_id: i64,

    #[validate(length(min = 7, message = "month must be an ISO date (YYYY-MM)"))]
    #[schema(example = "2024-03")]
    pub month: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignBillPayload {
    #[validate(range(min = 1, message = "residentId is required"))]
    pub resident_id: i64,
}

/// Bill becomes PAID only when a successful payment covers the full total.
/// PAID never regresses; failed, cancelled, partial or pending payments leave the
/// bill as it was (which is PENDING unless an earlier payment already settled it).
pub fn bill_status_after_payment(
    current: BillStatus,
    payment_status: PaymentStatus,
    paid_amount: Decimal,
    total_amount: Decimal,
) -> BillStatus {
    match (current, payment_status) {
        (BillStatus::Paid, _) => BillStatus::Paid,
        (_, PaymentStatus::Success) if paid_amount >= total_amount => BillStatus::Paid,
        _ => BillStatus::Pending,
    }
}
