// src/db/society_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::society::{Society, SocietyStatus},
};

#[derive(Clone)]
pub struct SocietyRepository {
    pool: PgPool,
}

impl SocietyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gate check used on every society-scoped request.
    pub async fn find_status(&self, society_id: i64) -> Result<Option<SocietyStatus>, AppError> {
        let status = sqlx::query_scalar::<_, SocietyStatus>(
            "SELECT status FROM societies WHERE id = $1",
        )
        .bind(society_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        society_id: i64,
    ) -> Result<Option<Society>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let society = sqlx::query_as::<_, Society>(
            "SELECT id, name, status, created_at, updated_at FROM societies WHERE id = $1",
        )
        .bind(society_id)
        .fetch_optional(executor)
        .await?;

        Ok(society)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        society_id: i64,
        status: SocietyStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE societies SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(society_id)
        .bind(status)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Society {society_id} not found")));
        }
        Ok(())
    }
}
