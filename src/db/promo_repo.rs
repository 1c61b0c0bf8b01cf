// src/db/promo_repo.rs

use sqlx::PgPool;

use crate::{common::error::AppError, models::subscription::Promo};

#[derive(Clone)]
pub struct PromoRepository {
    pool: PgPool,
}

impl PromoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Promo>, AppError> {
        let promo = sqlx::query_as::<_, Promo>(
            "SELECT id, code, status, expiry_date, discount_kind, discount, max_discount, min_amount \
             FROM promos WHERE code = $1",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }
}
