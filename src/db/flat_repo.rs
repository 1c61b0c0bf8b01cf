// src/db/flat_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::society::{Flat, FlatResidency},
};

const FLAT_COLUMNS: &str = "id, number, society_id, owner_id, flat_type, created_at, updated_at";
const RESIDENCY_COLUMNS: &str = "id, flat_id, resident_id, start_date, end_date, created_at";

#[derive(Clone)]
pub struct FlatRepository {
    pool: PgPool,
}

impl FlatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  FLATS
    // =========================================================================

    pub async fn find_by_id(&self, flat_id: i64) -> Result<Option<Flat>, AppError> {
        let flat = sqlx::query_as::<_, Flat>(&format!(
            "SELECT {FLAT_COLUMNS} FROM flats WHERE id = $1"
        ))
        .bind(flat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flat)
    }

    /// Row lock serialising concurrent resident changes on the same flat.
    pub async fn lock_by_id<'e, E>(&self, executor: E, flat_id: i64) -> Result<Option<Flat>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let flat = sqlx::query_as::<_, Flat>(&format!(
            "SELECT {FLAT_COLUMNS} FROM flats WHERE id = $1 FOR UPDATE"
        ))
        .bind(flat_id)
        .fetch_optional(executor)
        .await?;

        Ok(flat)
    }

    pub async fn list_by_society<'e, E>(
        &self,
        executor: E,
        society_id: i64,
    ) -> Result<Vec<Flat>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let flats = sqlx::query_as::<_, Flat>(&format!(
            "SELECT {FLAT_COLUMNS} FROM flats WHERE society_id = $1 ORDER BY number ASC, id ASC"
        ))
        .bind(society_id)
        .fetch_all(executor)
        .await?;

        Ok(flats)
    }

    // =========================================================================
    //  RESIDENCIES
    // =========================================================================

    /// Residencies of one flat whose `[start_date, end_date]` window contains `as_of`.
    pub async fn residencies_covering<'e, E>(
        &self,
        executor: E,
        flat_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<FlatResidency>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, FlatResidency>(&format!(
            r#"
            SELECT {RESIDENCY_COLUMNS}
            FROM flat_residents
            WHERE flat_id = $1
              AND start_date <= $2
              AND (end_date IS NULL OR end_date >= $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(flat_id)
        .bind(as_of)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Same window, for every flat of a society in one round trip.
    pub async fn residencies_covering_in_society<'e, E>(
        &self,
        executor: E,
        society_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<FlatResidency>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, FlatResidency>(
            r#"
            SELECT r.id, r.flat_id, r.resident_id, r.start_date, r.end_date, r.created_at
            FROM flat_residents r
            JOIN flats f ON f.id = r.flat_id
            WHERE f.society_id = $1
              AND r.start_date <= $2
              AND (r.end_date IS NULL OR r.end_date >= $2)
            ORDER BY r.flat_id, r.created_at DESC, r.id DESC
            "#,
        )
        .bind(society_id)
        .bind(as_of)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn open_residencies<'e, E>(
        &self,
        executor: E,
        flat_id: i64,
    ) -> Result<Vec<FlatResidency>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, FlatResidency>(&format!(
            r#"
            SELECT {RESIDENCY_COLUMNS}
            FROM flat_residents
            WHERE flat_id = $1 AND end_date IS NULL
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(flat_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// End dates already used by closed rows of this (flat, resident) pair at or after `from`.
    pub async fn end_dates_from<'e, E>(
        &self,
        executor: E,
        flat_id: i64,
        resident_id: i64,
        from: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let dates = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT end_date
            FROM flat_residents
            WHERE flat_id = $1 AND resident_id = $2 AND end_date >= $3
            ORDER BY end_date
            "#,
        )
        .bind(flat_id)
        .bind(resident_id)
        .bind(from)
        .fetch_all(executor)
        .await?;

        Ok(dates)
    }

    pub async fn close_residency<'e, E>(
        &self,
        executor: E,
        residency_id: i64,
        end_date: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE flat_residents SET end_date = $2 WHERE id = $1 AND end_date IS NULL")
            .bind(residency_id)
            .bind(end_date)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn open_residency<'e, E>(
        &self,
        executor: E,
        flat_id: i64,
        resident_id: i64,
        start_date: DateTime<Utc>,
    ) -> Result<FlatResidency, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, FlatResidency>(&format!(
            r#"
            INSERT INTO flat_residents (flat_id, resident_id, start_date)
            VALUES ($1, $2, $3)
            RETURNING {RESIDENCY_COLUMNS}
            "#
        ))
        .bind(flat_id)
        .bind(resident_id)
        .bind(start_date)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(
                e,
                AppError::Conflict(format!("Flat {flat_id} already has an active resident")),
            )
        })?;

        Ok(row)
    }
}
