// src/handlers/payments.rs

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::callback::{self, Reconciled},
    middleware::{auth::AuthenticatedUser, society::SocietyContext},
    models::payment::{InitiatePaymentPayload, InitiatedPayment, Payment},
};

#[utoipa::path(
    post,
    path = "/api/payments/initiate",
    tag = "Payments",
    request_body = InitiatePaymentPayload,
    responses(
        (status = 200, description = "Gateway session opened", body = InitiatedPayment),
        (status = 400, description = "Amount must be positive"),
        (status = 409, description = "Bill already paid"),
        (status = 502, description = "Gateway rejected or unreachable")
    ),
    params(
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn initiate_payment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    society: SocietyContext,
    Json(payload): Json<InitiatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    tracing::info!(user_id = user.user_id, bill_id = payload.bill_id, "payment initiation requested");

    let initiated = app_state
        .payment_service
        .initiate(payload.bill_id, payload.amount, society.0)
        .await?;

    Ok(Json(initiated))
}

/// Gateway callback for bill payments. Mounted on every success/fail/cancel alias;
/// the outcome comes from the payload and verification, never from the path.
#[utoipa::path(
    post,
    path = "/api/payments/success",
    tag = "Payments",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the frontend page for the resulting status")
    )
)]
pub async fn payment_callback(State(app_state): State<AppState>, body: Bytes) -> Response {
    let service = &app_state.payment_service;

    let outcome = async {
        let cb = callback::parse(&body)?;
        let payment = service.handle_callback(&cb).await?;
        Ok::<_, AppError>(Reconciled {
            id: payment.id,
            tran_id: payment.tran_id,
            status: payment.status,
        })
    }
    .await;

    callback::respond("payment", service.urls(), outcome)
}

#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    tag = "Payments",
    responses(
        (status = 200, description = "Payment", body = Payment),
        (status = 404, description = "Not found, or owned by another society")
    ),
    params(
        ("payment_id" = i64, Path, description = "Payment ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_payment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let payment = app_state.payment_service.find_by_id(payment_id).await?;
    // Payments of other societies are reported as absent.
    user.member_of(payment.society_id)
        .map_err(|_| AppError::NotFound(format!("Payment {payment_id} not found")))?;
    Ok(Json(payment))
}

#[utoipa::path(
    get,
    path = "/api/payments/society/{society_id}",
    tag = "Payments",
    responses(
        (status = 200, description = "Payments of the society, newest first", body = Vec<Payment>),
        (status = 403, description = "Caller belongs to another society")
    ),
    params(
        ("society_id" = i64, Path, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_society_payments(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(society_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.member_of(society_id)?;
    let payments = app_state.payment_service.society_payments(society_id).await?;
    Ok(Json(payments))
}
