// src/models/charges.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One `{name, amount}` entry of a bill snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChargeLine {
    #[schema(example = "Guard")]
    pub name: String,
    #[schema(value_type = String, example = "500.00")]
    pub amount: Decimal,
}

// Charge row joined with its predefined charge type (the human-readable name).
#[derive(Debug, Clone, FromRow)]
pub struct NamedCharge {
    pub name: String,
    pub amount: Decimal,
}

impl From<NamedCharge> for ChargeLine {
    fn from(row: NamedCharge) -> Self {
        ChargeLine {
            name: row.name,
            amount: row.amount,
        }
    }
}

/// Result of the charge aggregation for one flat in one month.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChargeBreakdown {
    pub common_charges: Vec<ChargeLine>,
    pub flat_charges: Vec<ChargeLine>,
    pub total: Decimal,
}

impl ChargeBreakdown {
    pub fn new(common_charges: Vec<ChargeLine>, flat_charges: Vec<ChargeLine>) -> Self {
        let total = common_charges
            .iter()
            .chain(flat_charges.iter())
            .fold(Decimal::ZERO, |acc, line| acc + line.amount);

        Self {
            common_charges,
            flat_charges,
            total,
        }
    }
}
