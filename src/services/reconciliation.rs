// src/services/reconciliation.rs
//
// Maps a parsed gateway callback (plus the server-side verification, when one is
// needed) to the status a PENDING payment-like row should move to.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::{
    models::{
        callback::{CallbackOutcome, GatewayCallback},
        payment::{PaymentStatus, Settlement},
    },
    services::gateway::{GatewayError, PaymentGateway, VerificationResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: PaymentStatus,
    /// Amount confirmed by the gateway, when verification reported one.
    pub verified_amount: Option<Decimal>,
    pub verified_currency: Option<String>,
    pub payment_method: Option<String>,
    pub details: Value,
    /// Set when the gateway contradicted itself (e.g. verified another transaction).
    pub anomaly: Option<String>,
}

impl Decision {
    /// Values to write back. Amount and currency come from verification or the stored row,
    /// never from the callback body.
    pub fn settlement(&self, stored_amount: Decimal, stored_currency: &str) -> Settlement {
        Settlement {
            status: self.status,
            amount: self.verified_amount.unwrap_or(stored_amount),
            currency: self
                .verified_currency
                .clone()
                .unwrap_or_else(|| stored_currency.to_string()),
            payment_method: self
                .payment_method
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            transaction_details: self.details.clone(),
        }
    }
}

fn base_details(callback: &GatewayCallback) -> serde_json::Map<String, Value> {
    let mut details = serde_json::Map::new();
    details.insert("callback".into(), callback.raw.clone());
    if let Some(bank_tran_id) = &callback.bank_tran_id {
        details.insert("bank_tran_id".into(), Value::String(bank_tran_id.clone()));
    }
    details
}

/// Pure transition table. `verification` is only consulted for a `Validated` outcome.
pub fn decide(
    callback: &GatewayCallback,
    verification: Option<Result<VerificationResult, GatewayError>>,
) -> Decision {
    let mut details = base_details(callback);
    let mut decision = Decision {
        status: PaymentStatus::Pending,
        verified_amount: None,
        verified_currency: None,
        payment_method: callback.card_type.clone(),
        details: Value::Null,
        anomaly: None,
    };

    match &callback.outcome {
        CallbackOutcome::Validated { .. } => match verification {
            Some(Ok(result)) => {
                details.insert("validation".into(), result.raw.clone());
                let mismatch = result
                    .tran_id
                    .as_deref()
                    .filter(|verified| *verified != callback.tran_id);

                if let Some(verified) = mismatch {
                    let reason = format!(
                        "verification refers to transaction {verified}, callback to {}",
                        callback.tran_id
                    );
                    details.insert("error".into(), json!(reason));
                    decision.status = PaymentStatus::Failed;
                    decision.anomaly = Some(reason);
                } else if result.is_valid() {
                    decision.status = PaymentStatus::Success;
                    decision.verified_amount = result.amount;
                    decision.verified_currency = result.currency.clone();
                    if result.card_type.is_some() {
                        decision.payment_method = result.card_type.clone();
                    }
                } else {
                    details.insert(
                        "error".into(),
                        json!(format!("Payment validation failed: status {}", result.status)),
                    );
                    decision.status = PaymentStatus::Failed;
                }
            }
            Some(Err(e)) => {
                details.insert("error".into(), json!(format!("Payment verification failed: {e}")));
                decision.status = PaymentStatus::Failed;
            }
            None => {
                details.insert("error".into(), json!("Payment verification was not performed"));
                decision.status = PaymentStatus::Failed;
            }
        },
        CallbackOutcome::Failed => decision.status = PaymentStatus::Failed,
        CallbackOutcome::Cancelled => decision.status = PaymentStatus::Cancelled,
        CallbackOutcome::Unrecognized(status) => {
            details.insert("error".into(), json!(format!("Unknown payment status: {status}")));
        }
    }

    decision.details = Value::Object(details);
    decision
}

/// Runs server-side verification when the callback claims success, then decides.
/// Must be called outside any database transaction.
pub async fn evaluate(gateway: &dyn PaymentGateway, callback: &GatewayCallback) -> Decision {
    let verification = match &callback.outcome {
        CallbackOutcome::Validated { val_id } => Some(gateway.verify(val_id).await),
        _ => None,
    };

    if let Some(Err(e)) = &verification {
        tracing::warn!(tran_id = %callback.tran_id, error = %e, "gateway verification failed");
    }

    let decision = decide(callback, verification);
    if let Some(anomaly) = &decision.anomaly {
        tracing::warn!(tran_id = %callback.tran_id, %anomaly, "data integrity anomaly in verification");
    }
    decision
}
