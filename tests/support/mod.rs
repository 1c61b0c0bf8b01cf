// tests/support/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::{postgres::PgPoolOptions, PgPool};
use society_backend::{
    config::{AppConfig, AppState},
    middleware::auth::Claims,
    services::{
        gateway::{GatewayError, InitiatedSession, InitiationRequest, PaymentGateway, VerificationResult},
        notification::LogNotifier,
    },
};

pub const JWT_SECRET: &str = "integration-secret";

/// Gateway double: initiation succeeds unless `initiation_times_out`, verification echoes
/// a fixed answer.
pub struct StubGateway {
    pub verify_status: &'static str,
    pub verified_amount: Option<rust_decimal::Decimal>,
    pub initiation_times_out: bool,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initiate(&self, request: &InitiationRequest) -> Result<InitiatedSession, GatewayError> {
        if self.initiation_times_out {
            return Err(GatewayError::Timeout);
        }
        Ok(InitiatedSession {
            gateway_url: format!("https://gateway.test/checkout/{}", request.tran_id),
            session_key: Some(format!("session-{}", request.tran_id)),
        })
    }

    async fn verify(&self, val_id: &str) -> Result<VerificationResult, GatewayError> {
        Ok(VerificationResult {
            status: self.verify_status.to_string(),
            tran_id: None,
            amount: self.verified_amount,
            currency: Some("BDT".into()),
            bank_tran_id: Some(format!("BANK-{val_id}")),
            card_type: Some("VISA".into()),
            raw: serde_json::json!({ "status": self.verify_status, "val_id": val_id }),
        })
    }
}

/// Only bill-payment and registration URLs are configured; subscriptions are left out on purpose.
pub fn config(database_url: &str) -> AppConfig {
    let vars = [
        ("DATABASE_URL", database_url),
        ("JWT_SECRET", JWT_SECRET),
        ("STORE_ID", "teststore"),
        ("STORE_PASSWORD", "teststore@ssl"),
        ("PAYMENT_GATEWAY_URL", "https://gateway.test/gwprocess/v4/api.php"),
        ("VALIDATION_URL", "https://gateway.test/validator/api/validationserverAPI.php"),
        ("SUCCESS_URL", "https://api.test/api/payments/success"),
        ("FAIL_URL", "https://api.test/api/payments/fail"),
        ("CANCEL_URL", "https://api.test/api/payments/cancel"),
        ("FRONTEND_SUCCESS_URL", "https://app.test/payment/success"),
        ("FRONTEND_FAIL_URL", "https://app.test/payment/fail"),
        ("FRONTEND_CANCEL_URL", "https://app.test/payment/cancel"),
        ("REGISTRATION_SUCCESS_URL", "https://api.test/api/registration-payments/success"),
        ("REGISTRATION_FAIL_URL", "https://api.test/api/registration-payments/failed"),
        ("REGISTRATION_CANCEL_URL", "https://api.test/api/registration-payments/cancelled"),
        ("REGISTRATION_FRONTEND_SUCCESS_URL", "https://app.test/register/success"),
        ("REGISTRATION_FRONTEND_FAIL_URL", "https://app.test/register/fail"),
        ("REGISTRATION_FRONTEND_CANCEL_URL", "https://app.test/register/cancel"),
    ];
    AppConfig::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("test configuration is complete")
}

pub fn state_with(pool: PgPool, database_url: &str, gateway: StubGateway) -> AppState {
    AppState::build(pool, config(database_url), Arc::new(gateway), Arc::new(LogNotifier))
}

/// State over a pool that never connects; enough for routes that fail before the store.
pub fn lazy_state() -> AppState {
    let url = "postgres://nobody@127.0.0.1:1/none";
    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy(url)
        .expect("lazy pool");
    state_with(
        pool,
        url,
        StubGateway {
            verify_status: "VALID",
            verified_amount: None,
            initiation_times_out: false,
        },
    )
}

pub fn token(user_id: i64, society_id: Option<i64>) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        society_id,
        exp: (now + 3600) as usize,
        iat: now as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes()))
        .expect("token encodes")
}

/// Migrated pool over `TEST_DATABASE_URL`. Only the `#[ignore]`d store scenarios call this.
pub async fn test_pool() -> (PgPool, String) {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a disposable Postgres database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("test database reachable");
    sqlx::migrate!().run(&pool).await.expect("migrations apply");
    (pool, url)
}

/// Ids of a freshly seeded society with one TWO_BHK flat and a "Guard" common charge.
pub struct Seed {
    pub society_id: i64,
    pub flat_id: i64,
    pub owner_id: i64,
    pub charge_id: i64,
}

pub async fn insert_user(pool: &PgPool, name: &str) -> i64 {
    let email = format!("{}-{}@society.test", name.to_lowercase(), uuid::Uuid::new_v4().simple());
    sqlx::query_scalar("INSERT INTO users (fullname, email) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("user inserted")
}

pub async fn seed_society(pool: &PgPool, guard_amount: rust_decimal::Decimal) -> Seed {
    let owner_id = insert_user(pool, "Owner").await;

    let society_id: i64 = sqlx::query_scalar(
        "INSERT INTO societies (name, status) VALUES ($1, 'ACTIVE') RETURNING id",
    )
    .bind(format!("Society {}", uuid::Uuid::new_v4().simple()))
    .fetch_one(pool)
    .await
    .expect("society inserted");

    let flat_id: i64 = sqlx::query_scalar(
        "INSERT INTO flats (number, society_id, owner_id, flat_type) \
         VALUES ('A-101', $1, $2, 'TWO_BHK') RETURNING id",
    )
    .bind(society_id)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .expect("flat inserted");

    let predefined_id: i64 = sqlx::query_scalar(
        "INSERT INTO predefined_service_charges (name) VALUES ('Guard') \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("predefined charge");

    let charge_id: i64 = sqlx::query_scalar(
        "INSERT INTO service_charges (society_id, predefined_service_charge_id, flat_type, amount) \
         VALUES ($1, $2, 'TWO_BHK', $3) RETURNING id",
    )
    .bind(society_id)
    .bind(predefined_id)
    .bind(guard_amount)
    .fetch_one(pool)
    .await
    .expect("service charge");

    Seed {
        society_id,
        flat_id,
        owner_id,
        charge_id,
    }
}
