// src/db/registration_repo.rs

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{
        payment::{PaymentStatus, Settlement},
        subscription::RegistrationPayment,
    },
};

const REGISTRATION_COLUMNS: &str = "id, email, society_id, user_id, promo_id, amount, currency, \
                                    status, tran_id, session_key, building_info, \
                                    transaction_details, payment_method, payment_date, \
                                    created_at, updated_at";

pub struct NewRegistration<'a> {
    pub email: &'a str,
    pub society_id: Option<i64>,
    pub user_id: Option<i64>,
    pub promo_id: Option<i64>,
    pub amount: Decimal,
    pub currency: &'a str,
    pub tran_id: &'a str,
    pub building_info: &'a Value,
}

#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending<'e, E>(
        &self,
        executor: E,
        new: NewRegistration<'_>,
    ) -> Result<RegistrationPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, RegistrationPayment>(&format!(
            r#"
            INSERT INTO registration_payments (email, society_id, user_id, promo_id, amount,
                                               currency, status, tran_id, building_info)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7, $8)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.society_id)
        .bind(new.user_id)
        .bind(new.promo_id)
        .bind(new.amount)
        .bind(new.currency)
        .bind(new.tran_id)
        .bind(new.building_info)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, AppError::Conflict("Duplicate transaction id".into()))
        })
    }

    pub async fn find_by_tran_id<'e, E>(
        &self,
        executor: E,
        tran_id: &str,
    ) -> Result<Option<RegistrationPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, RegistrationPayment>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registration_payments WHERE tran_id = $1"
        ))
        .bind(tran_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Either filter may be omitted, not both (checked by the service).
    pub async fn history(
        &self,
        email: Option<&str>,
        society_id: Option<i64>,
    ) -> Result<Vec<RegistrationPayment>, AppError> {
        let rows = sqlx::query_as::<_, RegistrationPayment>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registration_payments
            WHERE ($1::TEXT IS NULL OR email = $1)
              AND ($2::BIGINT IS NULL OR society_id = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(email)
        .bind(society_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn attach_session<'e, E>(
        &self,
        executor: E,
        registration_id: i64,
        session_key: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE registration_payments SET session_key = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(registration_id)
        .bind(session_key)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn mark_failed<'e, E>(
        &self,
        executor: E,
        registration_id: i64,
        details: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE registration_payments
            SET status = 'FAILED', transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(registration_id)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn settle<'e, E>(
        &self,
        executor: E,
        registration_id: i64,
        settlement: &Settlement,
    ) -> Result<Option<RegistrationPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, RegistrationPayment>(&format!(
            r#"
            UPDATE registration_payments
            SET status = $2,
                amount = $3,
                currency = $4,
                payment_method = $5,
                transaction_details = $6,
                payment_date = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(registration_id)
        .bind(settlement.status)
        .bind(settlement.amount)
        .bind(&settlement.currency)
        .bind(&settlement.payment_method)
        .bind(&settlement.transaction_details)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn record_pending_diagnostics<'e, E>(
        &self,
        executor: E,
        registration_id: i64,
        details: &Value,
    ) -> Result<Option<RegistrationPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, RegistrationPayment>(&format!(
            r#"
            UPDATE registration_payments
            SET transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(registration_id)
        .bind(details)
        .bind(PaymentStatus::Pending)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
