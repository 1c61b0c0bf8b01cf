// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{common::error::AppError, models::society::UserSummary};

// Read-only access to users; accounts themselves are managed elsewhere.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserSummary>, AppError> {
        self.find_in(&self.pool, id).await
    }

    pub async fn find_in<'e, E>(&self, executor: E, id: i64) -> Result<Option<UserSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, UserSummary>(
            "SELECT id, fullname, email FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }
}
