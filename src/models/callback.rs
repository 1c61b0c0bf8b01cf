// src/models/callback.rs

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::common::error::AppError;

/// What the gateway claims happened. Only a hint: `Validated` still goes through
/// server-side verification before anything is marked SUCCESS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Validated { val_id: String },
    Failed,
    Cancelled,
    Unrecognized(String),
}

/// Inbound gateway notification, parsed and checked at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub tran_id: String,
    pub outcome: CallbackOutcome,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub card_type: Option<String>,
    pub bank_tran_id: Option<String>,
    /// Whole payload as received, kept for the audit trail.
    pub raw: Value,
}

/// The gateway posts `application/x-www-form-urlencoded` by default; some
/// integrations replay callbacks as JSON. Both end up as a flat JSON object.
pub fn parse_callback_body(body: &[u8]) -> Result<Value, AppError> {
    let trimmed = body.trim_ascii_start();
    if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Malformed callback JSON: {e}")))?;
        return match value {
            Value::Object(_) => Ok(value),
            _ => Err(AppError::InvalidInput("Callback body must be an object".into())),
        };
    }

    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| AppError::InvalidInput(format!("Malformed callback form: {e}")))?;

    let map: Map<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Ok(Value::Object(map))
}

// Gateways are inconsistent about numbers vs strings; accept both.
fn text_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<Value> for GatewayCallback {
    type Error = AppError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let tran_id = text_field(&raw, "tran_id")
            .ok_or_else(|| AppError::InvalidInput("Callback is missing tran_id".into()))?;

        let status = text_field(&raw, "status").unwrap_or_default();
        let outcome = match status.to_ascii_uppercase().as_str() {
            "VALID" | "VALIDATED" => {
                let val_id = text_field(&raw, "val_id").ok_or_else(|| {
                    AppError::InvalidInput(format!("Callback {tran_id} reports {status} without val_id"))
                })?;
                CallbackOutcome::Validated { val_id }
            }
            "FAILED" => CallbackOutcome::Failed,
            "CANCELED" | "CANCELLED" => CallbackOutcome::Cancelled,
            _ => CallbackOutcome::Unrecognized(status),
        };

        // An unparsable amount is ignored: the stored or verified amount is authoritative.
        let amount = text_field(&raw, "amount").and_then(|a| a.parse::<Decimal>().ok());

        Ok(Self {
            tran_id,
            outcome,
            amount,
            currency: text_field(&raw, "currency"),
            card_type: text_field(&raw, "card_type"),
            bank_tran_id: text_field(&raw, "bank_tran_id"),
            raw,
        })
    }
}
