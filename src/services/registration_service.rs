// src/services/registration_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::{AppConfig, FlowUrls},
    db::{
        registration_repo::NewRegistration, PromoRepository, RegistrationRepository,
        SocietyRepository, UserRepository,
    },
    models::{
        callback::GatewayCallback,
        payment::PaymentStatus,
        subscription::{
            InitiateRegistrationPayload, InitiatedRegistration, RegistrationHistoryQuery,
            RegistrationPayment, RegistrationQuote,
        },
    },
    services::{
        gateway::{InitiationRequest, PaymentGateway},
        payment_service::new_tran_id,
        pricing, reconciliation,
        subscription_service::usable_promo,
    },
};

#[derive(Clone)]
pub struct RegistrationService {
    pool: PgPool,
    repo: RegistrationRepository,
    society_repo: SocietyRepository,
    promo_repo: PromoRepository,
    user_repo: UserRepository,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl RegistrationService {
    pub fn new(
        pool: PgPool,
        repo: RegistrationRepository,
        society_repo: SocietyRepository,
        promo_repo: PromoRepository,
        user_repo: UserRepository,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            pool,
            repo,
            society_repo,
            promo_repo,
            user_repo,
            gateway,
            config,
        }
    }

    pub fn urls(&self) -> Result<&FlowUrls, AppError> {
        self.config
            .registration_urls
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationError("registration redirect URLs".into()))
    }

    pub fn quote(&self) -> RegistrationQuote {
        pricing::registration_quote()
    }

    /// Registration happens before any account exists, so the row is keyed by email
    /// and carries the building details for later provisioning.
    pub async fn initiate(
        &self,
        payload: InitiateRegistrationPayload,
    ) -> Result<InitiatedRegistration, AppError> {
        if payload.amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }
        let urls = self.urls()?;

        if let Some(society_id) = payload.society_id {
            self.society_repo
                .find_by_id(&self.pool, society_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Society {society_id} not found")))?;
        }

        let promo = usable_promo(&self.promo_repo, payload.promo_code.as_deref()).await?;
        let amount = match &promo {
            Some(promo) => promo.apply(payload.amount)?,
            None => payload.amount,
        };
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }
        let building_info = serde_json::to_value(&payload.building_info)
            .map_err(|e| AppError::InternalServerError(e.into()))?;

        let tran_id = new_tran_id("REG");
        let currency = self.config.gateway.currency.as_str();
        let registration = self
            .repo
            .create_pending(
                &self.pool,
                NewRegistration {
                    email: &payload.email,
                    society_id: payload.society_id,
                    user_id: payload.user_id,
                    promo_id: promo.as_ref().map(|p| p.id),
                    amount,
                    currency,
                    tran_id: &tran_id,
                    building_info: &building_info,
                },
            )
            .await?;

        tracing::info!(registration_id = registration.id, %tran_id, email = %payload.email, "registration payment created, contacting gateway");

        let request = InitiationRequest {
            tran_id: tran_id.clone(),
            amount,
            currency: currency.to_string(),
            customer_name: payload.building_info.name.clone(),
            customer_email: payload.email.clone(),
            product_name: "Society registration".to_string(),
            callbacks: urls.callbacks.clone(),
        };

        match self.gateway.initiate(&request).await {
            Ok(session) => {
                self.repo
                    .attach_session(&self.pool, registration.id, session.session_key.as_deref())
                    .await?;

                Ok(InitiatedRegistration {
                    payment_url: session.gateway_url,
                    payment_id: registration.id,
                    tran_id,
                })
            }
            Err(e) => {
                tracing::warn!(registration_id = registration.id, %tran_id, error = %e, "gateway initiation failed");
                self.repo
                    .mark_failed(&self.pool, registration.id, &json!({ "error": e.to_string() }))
                    .await?;
                Err(e.into())
            }
        }
    }

    pub async fn handle_callback(
        &self,
        callback: &GatewayCallback,
    ) -> Result<RegistrationPayment, AppError> {
        let registration = self
            .repo
            .find_by_tran_id(&self.pool, &callback.tran_id)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(callback.tran_id.clone()))?;

        if registration.status.is_terminal() {
            tracing::info!(registration_id = registration.id, status = registration.status.as_str(), "callback for settled registration ignored");
            return Ok(registration);
        }

        let decision = reconciliation::evaluate(self.gateway.as_ref(), callback).await;

        let updated = if decision.status == PaymentStatus::Pending {
            tracing::warn!(registration_id = registration.id, tran_id = %callback.tran_id, "unrecognised callback status, registration stays pending");
            self.repo
                .record_pending_diagnostics(&self.pool, registration.id, &decision.details)
                .await?
        } else {
            let settlement = decision.settlement(registration.amount, &registration.currency);
            let updated = self.repo.settle(&self.pool, registration.id, &settlement).await?;
            match &updated {
                Some(row) => tracing::info!(
                    registration_id = row.id,
                    tran_id = %row.tran_id,
                    status = row.status.as_str(),
                    "registration payment reconciled"
                ),
                None => tracing::info!(registration_id = registration.id, "concurrent callback already settled registration"),
            }
            updated
        };

        match updated {
            Some(row) => Ok(row),
            None => self
                .repo
                .find_by_tran_id(&self.pool, &callback.tran_id)
                .await?
                .ok_or_else(|| AppError::UnknownTransaction(callback.tran_id.clone())),
        }
    }

    /// At least one of the two filters is required. A society filter must be the caller's
    /// own society; an email-only lookup must be the caller's own email.
    pub async fn history(
        &self,
        caller_id: i64,
        caller_society: Option<i64>,
        query: &RegistrationHistoryQuery,
    ) -> Result<Vec<RegistrationPayment>, AppError> {
        let email = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        match (email, query.society_id) {
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Either email or societyId must be provided".into(),
                ));
            }
            (_, Some(society_id)) if caller_society != Some(society_id) => {
                return Err(AppError::Forbidden(format!(
                    "User {caller_id} is not a member of society {society_id}"
                )));
            }
            (Some(email), None) => {
                let own = self.user_repo.find_by_id(caller_id).await?;
                if !own.is_some_and(|u| u.email.eq_ignore_ascii_case(email)) {
                    return Err(AppError::Forbidden(
                        "Registration history is only visible to the registrant".into(),
                    ));
                }
            }
            _ => {}
        }
        self.repo.history(email, query.society_id).await
    }
}
