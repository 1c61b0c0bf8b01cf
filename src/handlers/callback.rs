// src/handlers/callback.rs
//
// Shared plumbing for the gateway -> backend callbacks of the three payment flows.
// The browser follows these responses, so every outcome becomes a redirect.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Url;

use crate::{
    common::error::AppError,
    config::FlowUrls,
    models::{
        callback::{parse_callback_body, GatewayCallback},
        payment::PaymentStatus,
    },
};

/// What the redirect needs to know about a reconciled row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub id: i64,
    pub tran_id: String,
    pub status: PaymentStatus,
}

pub fn parse(body: &[u8]) -> Result<GatewayCallback, AppError> {
    GatewayCallback::try_from(parse_callback_body(body)?)
}

/// Frontend page for the row's resulting status, regardless of which callback URL was hit.
pub fn redirect_target(urls: &FlowUrls, outcome: &Result<Reconciled, AppError>) -> Url {
    match outcome {
        Ok(row) => {
            let mut url = match row.status {
                PaymentStatus::Success => urls.frontend_success.clone(),
                PaymentStatus::Cancelled => urls.frontend_cancel.clone(),
                PaymentStatus::Failed | PaymentStatus::Pending => urls.frontend_fail.clone(),
            };
            url.query_pairs_mut()
                .append_pair("tran_id", &row.tran_id)
                .append_pair("status", row.status.as_str())
                .append_pair("payment_id", &row.id.to_string());
            url
        }
        Err(e) => {
            let mut url = urls.frontend_fail.clone();
            url.query_pairs_mut().append_pair("error", &e.to_string());
            url
        }
    }
}

fn found(location: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.as_str().to_string())]).into_response()
}

/// Redirect response for a callback. Without configured frontend URLs there is nowhere
/// to send the browser, so the configuration error is returned as JSON instead.
pub fn respond(
    flow: &str,
    urls: Result<&FlowUrls, AppError>,
    outcome: Result<Reconciled, AppError>,
) -> Response {
    if let Err(e) = &outcome {
        tracing::warn!(flow, error = %e, "callback rejected");
    }

    match urls {
        Ok(urls) => found(&redirect_target(urls, &outcome)),
        Err(config_error) => config_error.into_response(),
    }
}
