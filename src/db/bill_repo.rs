// src/db/bill_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{
        bill::{Bill, BillPaymentInfo, BillRow, BillStatus},
        charges::ChargeLine,
    },
};

const BILL_COLUMNS: &str = "id, user_id, flat_id, society_id, bill_month, common_charges, \
                            flat_charges, total_amount, status, created_at, updated_at";

// Bill joined with the flat and society it belongs to.
const BILL_ROW_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.flat_id, b.society_id, b.bill_month, b.common_charges,
           b.flat_charges, b.total_amount, b.status, b.created_at, b.updated_at,
           f.number AS flat_number, f.flat_type, s.name AS society_name
    FROM bills b
    JOIN flats f ON f.id = b.flat_id
    JOIN societies s ON s.id = b.society_id
"#;

pub struct NewBill<'a> {
    pub user_id: i64,
    pub flat_id: i64,
    pub society_id: i64,
    pub bill_month: DateTime<Utc>,
    pub common_charges: &'a [ChargeLine],
    pub flat_charges: &'a [ChargeLine],
    pub total_amount: Decimal,
}

#[derive(Clone)]
pub struct BillRepository {
    pool: PgPool,
}

impl BillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  WRITES (run inside the caller's transaction)
    // =========================================================================

    pub async fn exists_for_month<'e, E>(
        &self,
        executor: E,
        society_id: i64,
        bill_month: DateTime<Utc>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM bills WHERE society_id = $1 AND bill_month = $2)",
        )
        .bind(society_id)
        .bind(bill_month)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    pub async fn create<'e, E>(&self, executor: E, bill: NewBill<'_>) -> Result<Bill, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Bill>(&format!(
            r#"
            INSERT INTO bills (user_id, flat_id, society_id, bill_month,
                               common_charges, flat_charges, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING')
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill.user_id)
        .bind(bill.flat_id)
        .bind(bill.society_id)
        .bind(bill.bill_month)
        .bind(Json(bill.common_charges))
        .bind(Json(bill.flat_charges))
        .bind(bill.total_amount)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::from_unique_violation(e, AppError::BillsAlreadyGenerated))
    }

    /// Locks the bill row so concurrent settlements of the same bill apply one at a time.
    pub async fn lock_by_id<'e, E>(&self, executor: E, bill_id: i64) -> Result<Option<Bill>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 FOR UPDATE"
        ))
        .bind(bill_id)
        .fetch_optional(executor)
        .await?;

        Ok(bill)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        bill_id: i64,
        status: BillStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE bills SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(bill_id)
            .bind(status)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn set_payer<'e, E>(&self, executor: E, bill_id: i64, user_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE bills SET user_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(bill_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  READS
    // =========================================================================

    pub async fn find_by_id(&self, bill_id: i64) -> Result<Option<Bill>, AppError> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"
        ))
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    pub async fn rows_by_ids<'e, E>(&self, executor: E, bill_ids: &[i64]) -> Result<Vec<BillRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "{BILL_ROW_SELECT} WHERE b.id = ANY($1) ORDER BY f.number ASC, b.id ASC"
        ))
        .bind(bill_ids)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn rows_by_society(&self, society_id: i64) -> Result<Vec<BillRow>, AppError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "{BILL_ROW_SELECT} WHERE b.society_id = $1 ORDER BY b.bill_month DESC, f.number ASC"
        ))
        .bind(society_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn rows_by_society_and_user(
        &self,
        society_id: i64,
        user_id: i64,
    ) -> Result<Vec<BillRow>, AppError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "{BILL_ROW_SELECT} WHERE b.society_id = $1 AND b.user_id = $2 \
             ORDER BY b.bill_month DESC, f.number ASC"
        ))
        .bind(society_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn payments_for_bills<'e, E>(
        &self,
        executor: E,
        bill_ids: &[i64],
    ) -> Result<Vec<BillPaymentInfo>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, BillPaymentInfo>(
            r#"
            SELECT id, bill_id, amount, status, payment_date, tran_id
            FROM payments
            WHERE bill_id = ANY($1)
            ORDER BY payment_date DESC, id DESC
            "#,
        )
        .bind(bill_ids)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }
}
