// src/services/charge_service.rs

use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::ChargeRepository,
    models::{
        charges::{ChargeBreakdown, ChargeLine},
        society::Flat,
    },
};

#[derive(Clone)]
pub struct ChargeService {
    repo: ChargeRepository,
}

impl ChargeService {
    pub fn new(repo: ChargeRepository) -> Self {
        Self { repo }
    }

    /// Common charges for the flat's type in its society plus the flat's own charges.
    /// An unconfigured flat yields an empty breakdown with a zero total.
    pub async fn compute_flat_charges(
        &self,
        conn: &mut PgConnection,
        flat: &Flat,
        society_id: i64,
    ) -> Result<ChargeBreakdown, AppError> {
        let common: Vec<ChargeLine> = self
            .repo
            .common_charges(&mut *conn, society_id, flat.flat_type)
            .await?
            .into_iter()
            .map(ChargeLine::from)
            .collect();

        let own: Vec<ChargeLine> = self
            .repo
            .flat_charges(&mut *conn, flat.id)
            .await?
            .into_iter()
            .map(ChargeLine::from)
            .collect();

        Ok(ChargeBreakdown::new(common, own))
    }
}
