// src/services/payment_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::{AppConfig, FlowUrls},
    db::{payment_repo::NewPayment, PaymentRepository, UserRepository},
    models::{
        bill::BillStatus,
        callback::GatewayCallback,
        payment::{InitiatedPayment, Payment, PaymentStatus},
    },
    services::{
        bill_service::BillService,
        gateway::{InitiationRequest, PaymentGateway},
        reconciliation,
    },
};

/// Local transaction id, unique before the gateway ever sees it.
pub fn new_tran_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    repo: PaymentRepository,
    user_repo: UserRepository,
    bill_service: BillService,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        repo: PaymentRepository,
        user_repo: UserRepository,
        bill_service: BillService,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            pool,
            repo,
            user_repo,
            bill_service,
            gateway,
            config,
        }
    }

    pub fn urls(&self) -> Result<&FlowUrls, AppError> {
        self.config
            .payment_urls
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationError("bill payment redirect URLs".into()))
    }

    // =========================================================================
    //  INITIATION
    // =========================================================================

    pub async fn initiate(
        &self,
        bill_id: i64,
        amount: Decimal,
        society_id: i64,
    ) -> Result<InitiatedPayment, AppError> {
        // 1. Eager checks, nothing written yet
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount);
        }
        let urls = self.urls()?;

        let bill = self
            .bill_service
            .find(bill_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {bill_id} not found")))?;
        if bill.society_id != society_id {
            return Err(AppError::Forbidden(format!(
                "Bill {bill_id} does not belong to society {society_id}"
            )));
        }
        if bill.status == BillStatus::Paid {
            return Err(AppError::BillAlreadyPaid(bill_id));
        }

        let payer = self
            .user_repo
            .find_by_id(bill.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", bill.user_id)))?;

        // 2. PENDING row first, so any callback has something to correlate with
        let tran_id = new_tran_id("TXN");
        let currency = self.config.gateway.currency.as_str();
        let payment = self
            .repo
            .create_pending(
                &self.pool,
                NewPayment {
                    user_id: bill.user_id,
                    flat_id: bill.flat_id,
                    society_id: bill.society_id,
                    bill_id: bill.id,
                    amount,
                    payment_month: bill.bill_month,
                    tran_id: &tran_id,
                    currency,
                },
            )
            .await?;

        tracing::info!(payment_id = payment.id, %tran_id, bill_id, %amount, "payment created, contacting gateway");

        // 3. Gateway session; any failure closes the row as FAILED
        let request = InitiationRequest {
            tran_id: tran_id.clone(),
            amount,
            currency: currency.to_string(),
            customer_name: payer.fullname,
            customer_email: payer.email,
            product_name: format!("Maintenance bill #{}", bill.id),
            callbacks: urls.callbacks.clone(),
        };

        match self.gateway.initiate(&request).await {
            Ok(session) => {
                self.repo
                    .attach_session(&self.pool, payment.id, session.session_key.as_deref())
                    .await?;

                Ok(InitiatedPayment {
                    payment_url: session.gateway_url,
                    payment_id: payment.id,
                    tran_id,
                })
            }
            Err(e) => {
                tracing::warn!(payment_id = payment.id, %tran_id, error = %e, "gateway initiation failed");
                self.repo
                    .mark_failed(&self.pool, payment.id, &json!({ "error": e.to_string() }))
                    .await?;
                Err(e.into())
            }
        }
    }

    // =========================================================================
    //  CALLBACK RECONCILIATION
    // =========================================================================

    /// Idempotent: a callback for an already settled payment returns it untouched.
    pub async fn handle_callback(&self, callback: &GatewayCallback) -> Result<Payment, AppError> {
        // 1. Correlate, never create
        let payment = self
            .repo
            .find_by_tran_id(&self.pool, &callback.tran_id)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(callback.tran_id.clone()))?;

        if payment.status.is_terminal() {
            tracing::info!(payment_id = payment.id, status = payment.status.as_str(), "callback for settled payment ignored");
            return Ok(payment);
        }

        // 2. Verification happens outside any transaction
        let decision = reconciliation::evaluate(self.gateway.as_ref(), callback).await;

        if decision.status == PaymentStatus::Pending {
            tracing::warn!(payment_id = payment.id, tran_id = %callback.tran_id, "unrecognised callback status, payment stays pending");
            let updated = self
                .repo
                .record_pending_diagnostics(&self.pool, payment.id, &decision.details)
                .await?;
            return self.current_or(updated, &callback.tran_id).await;
        }

        let settlement = decision.settlement(payment.amount, &payment.currency);

        // 3. Compare-and-swap plus bill side effects, together
        let mut tx = self.pool.begin().await?;
        let Some(updated) = self.repo.settle(&mut *tx, payment.id, &settlement).await? else {
            tx.rollback().await?;
            tracing::info!(payment_id = payment.id, "concurrent callback already settled payment");
            return self.current_or(None, &callback.tran_id).await;
        };

        let notification = match updated.bill_id {
            Some(bill_id) => {
                self.bill_service
                    .apply_payment(&mut tx, bill_id, updated.status, updated.amount)
                    .await?
            }
            None => None,
        };

        tx.commit().await?;

        tracing::info!(
            payment_id = updated.id,
            tran_id = %updated.tran_id,
            status = updated.status.as_str(),
            amount = %updated.amount,
            "payment reconciled"
        );

        if let Some(notification) = notification {
            self.bill_service.notify(notification);
        }
        Ok(updated)
    }

    async fn current_or(&self, updated: Option<Payment>, tran_id: &str) -> Result<Payment, AppError> {
        if let Some(payment) = updated {
            return Ok(payment);
        }
        self.repo
            .find_by_tran_id(&self.pool, tran_id)
            .await?
            .ok_or_else(|| AppError::UnknownTransaction(tran_id.to_string()))
    }

    // =========================================================================
    //  LOOKUPS
    // =========================================================================

    pub async fn find_by_id(&self, payment_id: i64) -> Result<Payment, AppError> {
        self.repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {payment_id} not found")))
    }

    pub async fn society_payments(&self, society_id: i64) -> Result<Vec<Payment>, AppError> {
        self.repo.list_by_society(society_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tran_ids_are_prefixed_and_unique() {
        let a = new_tran_id("TXN");
        let b = new_tran_id("TXN");
        assert!(a.starts_with("TXN-"));
        assert_eq!(a.len(), "TXN-".len() + 32);
        assert_ne!(a, b);
    }
}
