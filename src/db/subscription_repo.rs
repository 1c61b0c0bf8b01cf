// src/db/subscription_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{
        payment::{PaymentStatus, Settlement},
        subscription::Subscription,
    },
};

const SUBSCRIPTION_COLUMNS: &str = "id, society_id, user_id, promo_id, email, amount, currency, \
                                    status, tran_id, session_key, transaction_details, \
                                    payment_method, payment_date, start_date, end_date, \
                                    created_at, updated_at";

pub struct NewSubscription<'a> {
    pub society_id: i64,
    pub user_id: Option<i64>,
    pub promo_id: Option<i64>,
    pub email: &'a str,
    pub amount: Decimal,
    pub currency: &'a str,
    pub tran_id: &'a str,
}

/// Validity window written together with a successful settlement.
#[derive(Debug, Clone, Copy)]
pub struct ActiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending<'e, E>(
        &self,
        executor: E,
        new: NewSubscription<'_>,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (society_id, user_id, promo_id, email, amount, currency,
                                       status, tran_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(new.society_id)
        .bind(new.user_id)
        .bind(new.promo_id)
        .bind(new.email)
        .bind(new.amount)
        .bind(new.currency)
        .bind(new.tran_id)
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
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE tran_id = $1"
        ))
        .bind(tran_id)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    pub async fn list_by_society(&self, society_id: i64) -> Result<Vec<Subscription>, AppError> {
        let rows = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE society_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(society_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn attach_session<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        session_key: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE subscriptions SET session_key = $2, updated_at = NOW() WHERE id = $1")
            .bind(subscription_id)
            .bind(session_key)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn mark_failed<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        details: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'FAILED', transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(subscription_id)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Compare-and-swap on PENDING. The window is only written for a successful settlement.
    pub async fn settle<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        settlement: &Settlement,
        window: Option<ActiveWindow>,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                amount = $3,
                currency = $4,
                payment_method = $5,
                transaction_details = $6,
                payment_date = NOW(),
                start_date = COALESCE($7, start_date),
                end_date = COALESCE($8, end_date),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription_id)
        .bind(settlement.status)
        .bind(settlement.amount)
        .bind(&settlement.currency)
        .bind(&settlement.payment_method)
        .bind(&settlement.transaction_details)
        .bind(window.map(|w| w.start))
        .bind(window.map(|w| w.end))
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    pub async fn record_pending_diagnostics<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        details: &Value,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET transaction_details = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription_id)
        .bind(details)
        .bind(PaymentStatus::Pending)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }
}
