// src/services/gateway.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway did not answer in time")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("gateway answered HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            // The request URL may carry store credentials.
            GatewayError::Transport(e.without_url().to_string())
        }
    }
}

/// Where the gateway sends the browser (and its server callback) afterwards.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    pub success: Url,
    pub fail: Url,
    pub cancel: Url,
}

#[derive(Debug, Clone)]
pub struct InitiationRequest {
    pub tran_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub product_name: String,
    pub callbacks: CallbackUrls,
}

#[derive(Debug, Clone)]
pub struct InitiatedSession {
    pub gateway_url: String,
    pub session_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub status: String,
    pub tran_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub bank_tran_id: Option<String>,
    pub card_type: Option<String>,
    pub raw: Value,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self.status.as_str(), "VALID" | "VALIDATED")
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &InitiationRequest) -> Result<InitiatedSession, GatewayError>;

    /// Server-to-server confirmation of a `val_id`. The callback's own status is never trusted.
    async fn verify(&self, val_id: &str) -> Result<VerificationResult, GatewayError>;
}

// ---
// SSLCommerz-style hosted checkout
// ---

#[derive(Debug, Deserialize)]
struct InitiationResponse {
    status: String,
    #[serde(rename = "GatewayPageURL")]
    gateway_page_url: Option<String>,
    sessionkey: Option<String>,
    failedreason: Option<String>,
}

#[derive(Clone)]
pub struct SslCommerzGateway {
    client: reqwest::Client,
    store_id: String,
    store_password: String,
    initiation_url: Url,
    validation_url: Url,
}

impl SslCommerzGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            store_id: config.store_id.clone(),
            store_password: config.store_password.clone(),
            initiation_url: config.initiation_url.clone(),
            validation_url: config.validation_url.clone(),
        })
    }

    /// Response bodies are logged, never carried in the error: errors end up in API
    /// responses and redirect URLs.
    async fn read_json(resp: reqwest::Response) -> Result<Value, GatewayError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %excerpt(&body), "gateway answered with an error status");
            return Err(GatewayError::HttpStatus {
                status: status.as_u16(),
            });
        }

        serde_json::from_str::<Value>(&body).map_err(|e| {
            tracing::warn!(error = %e, body = %excerpt(&body), "gateway answered with non-JSON body");
            GatewayError::MalformedResponse("response is not JSON".into())
        })
    }
}

const EXCERPT_CHARS: usize = 200;

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn decimal_field(raw: &Value, key: &str) -> Option<Decimal> {
    match raw.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PaymentGateway for SslCommerzGateway {
    async fn initiate(&self, request: &InitiationRequest) -> Result<InitiatedSession, GatewayError> {
        let total_amount = request.amount.to_string();
        let form = [
            ("store_id", self.store_id.as_str()),
            ("store_passwd", self.store_password.as_str()),
            ("total_amount", total_amount.as_str()),
            ("currency", request.currency.as_str()),
            ("tran_id", request.tran_id.as_str()),
            ("success_url", request.callbacks.success.as_str()),
            ("fail_url", request.callbacks.fail.as_str()),
            ("cancel_url", request.callbacks.cancel.as_str()),
            ("ipn_url", request.callbacks.success.as_str()),
            ("cus_name", request.customer_name.as_str()),
            ("cus_email", request.customer_email.as_str()),
            ("cus_add1", "Dhaka"),
            ("cus_city", "Dhaka"),
            ("cus_country", "Bangladesh"),
            ("shipping_method", "NO"),
            ("product_name", request.product_name.as_str()),
            ("product_category", "Service"),
            ("product_profile", "non-physical-goods"),
        ];

        let resp = self
            .client
            .post(self.initiation_url.clone())
            .form(&form)
            .send()
            .await?;

        let raw = Self::read_json(resp).await?;
        let parsed: InitiationResponse = serde_json::from_value(raw)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if parsed.status != "SUCCESS" {
            let reason = parsed
                .failedreason
                .map(|r| excerpt(&r))
                .unwrap_or_else(|| format!("status {}", excerpt(&parsed.status)));
            return Err(GatewayError::Rejected(reason));
        }

        let gateway_url = parsed
            .gateway_page_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GatewayError::MalformedResponse("missing GatewayPageURL".into()))?;

        Ok(InitiatedSession {
            gateway_url,
            session_key: parsed.sessionkey,
        })
    }

    async fn verify(&self, val_id: &str) -> Result<VerificationResult, GatewayError> {
        let resp = self
            .client
            .get(self.validation_url.clone())
            .query(&[
                ("val_id", val_id),
                ("store_id", self.store_id.as_str()),
                ("store_passwd", self.store_password.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let raw = Self::read_json(resp).await?;
        let status = string_field(&raw, "status")
            .ok_or_else(|| GatewayError::MalformedResponse("verification without status".into()))?;

        Ok(VerificationResult {
            status,
            tran_id: string_field(&raw, "tran_id"),
            amount: decimal_field(&raw, "amount"),
            currency: string_field(&raw, "currency"),
            bank_tran_id: string_field(&raw, "bank_tran_id"),
            card_type: string_field(&raw, "card_type"),
            raw,
        })
    }
}
