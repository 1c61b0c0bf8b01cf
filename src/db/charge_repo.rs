// src/db/charge_repo.rs

use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    models::{charges::NamedCharge, society::FlatType},
};

// Charge lookups only ever run inside a bill generation transaction.
#[derive(Clone, Default)]
pub struct ChargeRepository;

impl ChargeRepository {
    pub fn new() -> Self {
        Self
    }

    /// Recurring charges configured for every flat of `flat_type` in the society.
    pub async fn common_charges<'e, E>(
        &self,
        executor: E,
        society_id: i64,
        flat_type: FlatType,
    ) -> Result<Vec<NamedCharge>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, NamedCharge>(
            r#"
            SELECT p.name, sc.amount
            FROM service_charges sc
            JOIN predefined_service_charges p ON p.id = sc.predefined_service_charge_id
            WHERE sc.society_id = $1 AND sc.flat_type = $2
            ORDER BY p.name ASC, sc.id ASC
            "#,
        )
        .bind(society_id)
        .bind(flat_type)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Charges attached to one specific flat.
    pub async fn flat_charges<'e, E>(
        &self,
        executor: E,
        flat_id: i64,
    ) -> Result<Vec<NamedCharge>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, NamedCharge>(
            r#"
            SELECT p.name, uc.amount
            FROM user_service_charges uc
            JOIN predefined_service_charges p ON p.id = uc.predefined_service_charge_id
            WHERE uc.flat_id = $1
            ORDER BY p.name ASC, uc.id ASC
            "#,
        )
        .bind(flat_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
