// src/db/payment_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::payment::{Payment, PaymentStatus, Settlement},
};

const PAYMENT_COLUMNS: &str = "id, user_id, flat_id, society_id, bill_id, amount, status, \
                               payment_month, payment_date, tran_id, session_key, \
                               transaction_details, currency, payment_method, created_at, updated_at";

pub struct NewPayment<'a> {
    pub user_id: i64,
    pub flat_id: i64,
    pub society_id: i64,
    pub bill_id: i64,
    pub amount: Decimal,
    pub payment_month: DateTime<Utc>,
    pub tran_id: &'a str,
    pub currency: &'a str,
}

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending<'e, E>(&self, executor: E, new: NewPayment<'_>) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (user_id, flat_id, society_id, bill_id, amount, status,
                                  payment_month, payment_date, tran_id, currency)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, NOW(), $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.flat_id)
        .bind(new.society_id)
        .bind(new.bill_id)
        .bind(new.amount)
        .bind(new.payment_month)
        .bind(new.tran_id)
        .bind(new.currency)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, AppError::Conflict("Duplicate transaction id".into()))
        })
    }

    pub async fn find_by_id(&self, payment_id: i64) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_tran_id<'e, E>(
        &self,
        executor: E,
        tran_id: &str,
    ) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE tran_id = $1"
        ))
        .bind(tran_id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn list_by_society(&self, society_id: i64) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE society_id = $1 \
             ORDER BY payment_date DESC, id DESC"
        ))
        .bind(society_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    pub async fn attach_session<'e, E>(
        &self,
        executor: E,
        payment_id: i64,
        session_key: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE payments SET session_key = $2, updated_at = NOW() WHERE id = $1")
            .bind(payment_id)
            .bind(session_key)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Initiation never reached the gateway (or was refused). Only a PENDING row is touched.
    pub async fn mark_failed<'e, E>(
        &self,
        executor: E,
        payment_id: i64,
        details: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED', transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(payment_id)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Compare-and-swap on `status = 'PENDING'`. `None` means another delivery already settled it.
    pub async fn settle<'e, E>(
        &self,
        executor: E,
        payment_id: i64,
        settlement: &Settlement,
    ) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                amount = $3,
                currency = $4,
                payment_method = $5,
                transaction_details = $6,
                payment_date = CASE WHEN $2 = 'SUCCESS'::payment_status THEN NOW() ELSE payment_date END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(settlement.status)
        .bind(settlement.amount)
        .bind(&settlement.currency)
        .bind(&settlement.payment_method)
        .bind(&settlement.transaction_details)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    /// Keeps the row PENDING but records why (unknown gateway status).
    pub async fn record_pending_diagnostics<'e, E>(
        &self,
        executor: E,
        payment_id: i64,
        details: &Value,
    ) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(details)
        .bind(PaymentStatus::Pending)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }
}
