// src/models/society.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Enums (Postgres mapped) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "society_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocietyStatus {
    Active,
    PaymentDue,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "flat_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlatType {
    TwoBhk,
    ThreeBhk,
    FourBhk,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Society {
    #[schema(example = 7)]
    pub id: i64,
    #[schema(example = "Lake View Residency")]
    pub name: String,
    pub status: SocietyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flat {
    pub id: i64,
    #[schema(example = "A-101")]
    pub number: String,
    pub society_id: i64,
    pub owner_id: i64,
    pub flat_type: FlatType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Temporal link between a flat and its resident. `end_date = None` means the
// residency is still open; closed rows are kept as history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlatResidency {
    pub id: i64,
    pub flat_id: i64,
    pub resident_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FlatResidency {
    /// `start_date <= as_of AND (end_date IS NULL OR end_date >= as_of)`
    pub fn covers(&self, as_of: DateTime<Utc>) -> bool {
        self.start_date <= as_of && self.end_date.is_none_or(|end| end >= as_of)
    }
}

// Minimal user projection needed for billing (payer name/email on the gateway form).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub fullname: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayerResponse {
    pub flat_id: i64,
    pub payer_id: i64,
    /// True when the payer is an active resident, false when it fell back to the owner.
    pub is_resident: bool,
    pub as_of: DateTime<Utc>,
}
