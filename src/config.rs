// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use reqwest::Url;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        BillRepository, ChargeRepository, FlatRepository, PaymentRepository, PromoRepository,
        RegistrationRepository, SocietyRepository, SubscriptionRepository, UserRepository,
    },
    services::{
        bill_service::BillService,
        charge_service::ChargeService,
        gateway::{CallbackUrls, PaymentGateway, SslCommerzGateway},
        notification::{LogNotifier, Notifier},
        payment_service::PaymentService,
        registration_service::RegistrationService,
        residency_service::ResidencyService,
        subscription_service::SubscriptionService,
    },
};

const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CURRENCY: &str = "BDT";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub store_id: String,
    pub store_password: String,
    pub initiation_url: Url,
    pub validation_url: Url,
    pub timeout_secs: u64,
    pub currency: String,
}

/// Callback URLs handed to the gateway plus the frontend pages the browser lands on.
#[derive(Debug, Clone)]
pub struct FlowUrls {
    pub callbacks: CallbackUrls,
    pub frontend_success: Url,
    pub frontend_fail: Url,
    pub frontend_cancel: Url,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub gateway: GatewayConfig,
    pub payment_urls: Option<FlowUrls>,
    pub subscription_urls: Option<FlowUrls>,
    pub registration_urls: Option<FlowUrls>,
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{key} must be set"))
}

fn parse_url(key: &str, value: &str) -> anyhow::Result<Url> {
    Url::parse(value).with_context(|| format!("{key} is not a valid URL: {value}"))
}

impl FlowUrls {
    const KEYS: [&'static str; 6] = [
        "SUCCESS_URL",
        "FAIL_URL",
        "CANCEL_URL",
        "FRONTEND_SUCCESS_URL",
        "FRONTEND_FAIL_URL",
        "FRONTEND_CANCEL_URL",
    ];

    /// All six keys or none. A half-configured flow is a startup error.
    fn from_lookup<F>(prefix: &str, lookup: &F) -> anyhow::Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values: Vec<(String, Option<String>)> = Self::KEYS
            .iter()
            .map(|k| {
                let key = format!("{prefix}{k}");
                let value = lookup(&key).filter(|v| !v.trim().is_empty());
                (key, value)
            })
            .collect();

        let present = values.iter().filter(|(_, v)| v.is_some()).count();
        if present == 0 {
            return Ok(None);
        }
        if present < Self::KEYS.len() {
            let missing: Vec<&str> = values
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k.as_str())
                .collect();
            return Err(anyhow!("incomplete redirect URL set, missing {}", missing.join(", ")));
        }

        let mut urls = Vec::with_capacity(Self::KEYS.len());
        for (key, value) in &values {
            let value = value.as_deref().unwrap_or_default();
            urls.push(parse_url(key, value.trim())?);
        }

        let [success, fail, cancel, frontend_success, frontend_fail, frontend_cancel]: [Url; 6] =
            urls.try_into()
                .map_err(|_| anyhow!("redirect URL set must hold six entries"))?;

        Ok(Some(Self {
            callbacks: CallbackUrls {
                success,
                fail,
                cancel,
            },
            frontend_success,
            frontend_fail,
            frontend_cancel,
        }))
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds and validates the whole configuration from a key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let jwt_secret = required(&lookup, "JWT_SECRET")?;

        let initiation_url = required(&lookup, "PAYMENT_GATEWAY_URL")?;
        let validation_url = required(&lookup, "VALIDATION_URL")?;

        let timeout_secs = match lookup("GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| anyhow!("GATEWAY_TIMEOUT_SECS must be a positive integer"))?,
            None => DEFAULT_GATEWAY_TIMEOUT_SECS,
        };

        let gateway = GatewayConfig {
            store_id: required(&lookup, "STORE_ID")?,
            store_password: required(&lookup, "STORE_PASSWORD")?,
            initiation_url: parse_url("PAYMENT_GATEWAY_URL", &initiation_url)?,
            validation_url: parse_url("VALIDATION_URL", &validation_url)?,
            timeout_secs,
            currency: lookup("GATEWAY_CURRENCY")
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            gateway,
            payment_urls: FlowUrls::from_lookup("", &lookup)?,
            subscription_urls: FlowUrls::from_lookup("SUBSCRIPTION_", &lookup)?,
            registration_urls: FlowUrls::from_lookup("REGISTRATION_", &lookup)?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub society_repo: SocietyRepository,
    pub bill_service: BillService,
    pub residency_service: ResidencyService,
    pub payment_service: PaymentService,
    pub subscription_service: SubscriptionService,
    pub registration_service: RegistrationService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = AppConfig::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("Database connection established");

        let gateway = SslCommerzGateway::new(&config.gateway)?;

        Ok(Self::build(
            db_pool,
            config,
            Arc::new(gateway),
            Arc::new(LogNotifier),
        ))
    }

    /// Wires repositories and services. Tests call this with a lazy pool and a stub gateway.
    pub fn build(
        db_pool: PgPool,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);

        let flat_repo = FlatRepository::new(db_pool.clone());
        let society_repo = SocietyRepository::new(db_pool.clone());
        let user_repo = UserRepository::new(db_pool.clone());
        let bill_repo = BillRepository::new(db_pool.clone());
        let promo_repo = PromoRepository::new(db_pool.clone());

        let charge_service = ChargeService::new(ChargeRepository::new());
        let residency_service = ResidencyService::new(
            db_pool.clone(),
            flat_repo.clone(),
            user_repo.clone(),
        );
        let bill_service = BillService::new(
            db_pool.clone(),
            bill_repo,
            flat_repo,
            society_repo.clone(),
            charge_service,
            notifier.clone(),
        );
        let payment_service = PaymentService::new(
            db_pool.clone(),
            PaymentRepository::new(db_pool.clone()),
            user_repo.clone(),
            bill_service.clone(),
            gateway.clone(),
            config.clone(),
        );
        let subscription_service = SubscriptionService::new(
            db_pool.clone(),
            SubscriptionRepository::new(db_pool.clone()),
            society_repo.clone(),
            promo_repo.clone(),
            gateway.clone(),
            notifier,
            config.clone(),
        );
        let registration_service = RegistrationService::new(
            db_pool.clone(),
            RegistrationRepository::new(db_pool.clone()),
            society_repo.clone(),
            promo_repo,
            user_repo,
            gateway,
            config.clone(),
        );

        Self {
            db_pool,
            config,
            society_repo,
            bill_service,
            residency_service,
            payment_service,
            subscription_service,
            registration_service,
        }
    }
}
