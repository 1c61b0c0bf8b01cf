// src/services/subscription_service.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::{AppConfig, FlowUrls},
    db::{
        subscription_repo::{ActiveWindow, NewSubscription},
        PromoRepository, SocietyRepository, SubscriptionRepository,
    },
    models::{
        callback::GatewayCallback,
        payment::PaymentStatus,
        society::SocietyStatus,
        subscription::{InitiateSubscriptionPayload, InitiatedSubscription, Promo, Subscription},
    },
    services::{
        gateway::{InitiationRequest, PaymentGateway},
        notification::{dispatch, Notification, Notifier},
        payment_service::new_tran_id,
        reconciliation,
    },
};

/// Length of the access window bought by one successful subscription payment.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

#[derive(Clone)]
pub struct SubscriptionService {
    pool: PgPool,
    repo: SubscriptionRepository,
    society_repo: SocietyRepository,
    promo_repo: PromoRepository,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: Arc<AppConfig>,
}

/// Looks a promo code up and refuses unknown, inactive or expired ones.
pub(crate) async fn usable_promo(
    promo_repo: &PromoRepository,
    code: Option<&str>,
) -> Result<Option<Promo>, AppError> {
    let Some(code) = code.filter(|c| !c.trim().is_empty()) else {
        return Ok(None);
    };

    let promo = promo_repo
        .find_by_code(code)
        .await?
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid promo code: {code}")))?;

    if !promo.is_usable(Utc::now()) {
        return Err(AppError::InvalidInput(format!("Promo code {code} is not active")));
    }
    Ok(Some(promo))
}

impl SubscriptionService {
    pub fn new(
        pool: PgPool,
        repo: SubscriptionRepository,
        society_repo: SocietyRepository,
        promo_repo: PromoRepository,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            pool,
            repo,
            society_repo,
            promo_repo,
            gateway,
            notifier,
            config,
        }
    }

    pub fn urls(&self) -> Result<&FlowUrls, AppError> {
        self.config
            .subscription_urls
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationError("subscription redirect URLs".into()))
    }

    pub async fn initiate(
        &self,
        user_id: Option<i64>,
        payload: InitiateSubscriptionPayload,
    ) -> Result<InitiatedSubscription, AppError> {
        // 1. Checks
        if payload.amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }
        let urls = self.urls()?;

        let society = self
            .society_repo
            .find_by_id(&self.pool, payload.society_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Society {} not found", payload.society_id)))?;

        let promo = usable_promo(&self.promo_repo, payload.promo_code.as_deref()).await?;
        let amount = match &promo {
            Some(promo) => promo.apply(payload.amount)?,
            None => payload.amount,
        };
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }

        // 2. PENDING row
        let tran_id = new_tran_id("SUB");
        let currency = self.config.gateway.currency.as_str();
        let subscription = self
            .repo
            .create_pending(
                &self.pool,
                NewSubscription {
                    society_id: society.id,
                    user_id,
                    promo_id: promo.as_ref().map(|p| p.id),
                    email: &payload.email,
                    amount,
                    currency,
                    tran_id: &tran_id,
                },
            )
            .await?;

        tracing::info!(subscription_id = subscription.id, %tran_id, society_id = society.id, "subscription created, contacting gateway");

        // 3. Gateway
        let request = InitiationRequest {
            tran_id: tran_id.clone(),
            amount,
            currency: currency.to_string(),
            customer_name: society.name.clone(),
            customer_email: payload.email.clone(),
            product_name: format!("{} subscription", society.name),
            callbacks: urls.callbacks.clone(),
        };

        match self.gateway.initiate(&request).await {
            Ok(session) => {
                self.repo
                    .attach_session(&self.pool, subscription.id, session.session_key.as_deref())
                    .await?;

                Ok(InitiatedSubscription {
                    payment_url: session.gateway_url,
                    subscription_id: subscription.id,
                    tran_id,
                })
            }
            Err(e) => {
                tracing::warn!(subscription_id = subscription.id, %tran_id, error = %e, "gateway initiation failed");
                self.repo
                    .mark_failed(&self.pool, subscription.id, &json!({ "error": e.to_string() }))
                    .await?;
                Err(e.into())
            }
        }
    }

    /// A successful settlement opens a fresh access window and activates the society,
    /// both in the settlement transaction.
    pub async fn handle_callback(&self, callback: &GatewayCallback) -> Result<Subscription, AppError> {
        let subscription = self
            .repo
            .find_by_tran_id(&self.pool, &callback.tran_id)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(callback.tran_id.clone()))?;

        if subscription.status.is_terminal() {
            tracing::info!(subscription_id = subscription.id, status = subscription.status.as_str(), "callback for settled subscription ignored");
            return Ok(subscription);
        }

        let decision = reconciliation::evaluate(self.gateway.as_ref(), callback).await;

        if decision.status == PaymentStatus::Pending {
            tracing::warn!(subscription_id = subscription.id, tran_id = %callback.tran_id, "unrecognised callback status, subscription stays pending");
            let updated = self
                .repo
                .record_pending_diagnostics(&self.pool, subscription.id, &decision.details)
                .await?;
            return self.current_or(updated, &callback.tran_id).await;
        }

        let settlement = decision.settlement(subscription.amount, &subscription.currency);
        let window = (settlement.status == PaymentStatus::Success).then(|| {
            let start = Utc::now();
            ActiveWindow {
                start,
                end: start + Duration::days(SUBSCRIPTION_PERIOD_DAYS),
            }
        });

        let mut tx = self.pool.begin().await?;
        let Some(updated) = self
            .repo
            .settle(&mut *tx, subscription.id, &settlement, window)
            .await?
        else {
            tx.rollback().await?;
            tracing::info!(subscription_id = subscription.id, "concurrent callback already settled subscription");
            return self.current_or(None, &callback.tran_id).await;
        };

        if window.is_some() {
            self.society_repo
                .set_status(&mut *tx, updated.society_id, SocietyStatus::Active)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            subscription_id = updated.id,
            tran_id = %updated.tran_id,
            status = updated.status.as_str(),
            society_id = updated.society_id,
            "subscription reconciled"
        );

        if let (Some(window), PaymentStatus::Success) = (window, updated.status) {
            tracing::info!(society_id = updated.society_id, valid_until = %window.end, "society activated");
            dispatch(
                &self.notifier,
                Notification::SubscriptionActivated {
                    society_id: updated.society_id,
                    email: updated.email.clone(),
                    valid_until: window.end,
                },
            );
        }
        Ok(updated)
    }

    async fn current_or(
        &self,
        updated: Option<Subscription>,
        tran_id: &str,
    ) -> Result<Subscription, AppError> {
        if let Some(subscription) = updated {
            return Ok(subscription);
        }
        self.repo
            .find_by_tran_id(&self.pool, tran_id)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(tran_id.to_string()))
    }

    pub async fn history(&self, society_id: i64) -> Result<Vec<Subscription>, AppError> {
        self.repo.list_by_society(society_id).await
    }
}
