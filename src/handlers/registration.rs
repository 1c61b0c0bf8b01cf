// src/handlers/registration.rs

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::callback::{self, Reconciled},
    middleware::auth::AuthenticatedUser,
    models::subscription::{
        InitiateRegistrationPayload, InitiatedRegistration, RegistrationHistoryQuery,
        RegistrationPayment, RegistrationQuote,
    },
};

#[utoipa::path(
    post,
    path = "/api/registration-payments/initiate",
    tag = "Registration",
    request_body = InitiateRegistrationPayload,
    responses(
        (status = 200, description = "Gateway session opened", body = InitiatedRegistration),
        (status = 400, description = "Invalid payload or promo code"),
        (status = 502, description = "Gateway rejected or unreachable")
    )
)]
pub async fn initiate_registration(
    State(app_state): State<AppState>,
    Json(payload): Json<InitiateRegistrationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let initiated = app_state.registration_service.initiate(payload).await?;
    Ok(Json(initiated))
}

#[utoipa::path(
    post,
    path = "/api/registration-payments/callback",
    tag = "Registration",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the frontend page for the resulting status")
    )
)]
pub async fn registration_callback(State(app_state): State<AppState>, body: Bytes) -> Response {
    let service = &app_state.registration_service;

    let outcome = async {
        let cb = callback::parse(&body)?;
        let registration = service.handle_callback(&cb).await?;
        Ok::<_, AppError>(Reconciled {
            id: registration.id,
            tran_id: registration.tran_id,
            status: registration.status,
        })
    }
    .await;

    callback::respond("registration", service.urls(), outcome)
}

#[utoipa::path(
    get,
    path = "/api/registration-payments/history",
    tag = "Registration",
    responses(
        (status = 200, description = "Registration payments, newest first", body = Vec<RegistrationPayment>),
        (status = 400, description = "Neither email nor societyId given"),
        (status = 403, description = "Society or email is not the caller's")
    ),
    params(
        ("email" = Option<String>, Query, description = "Registrant email"),
        ("societyId" = Option<i64>, Query, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn registration_history(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<RegistrationHistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state
        .registration_service
        .history(user.user_id, user.society_id, &query)
        .await?;
    Ok(Json(history))
}

#[utoipa::path(
    get,
    path = "/api/registration-payments/quote",
    tag = "Registration",
    responses(
        (status = 200, description = "Registration price", body = RegistrationQuote)
    )
)]
pub async fn registration_quote(State(app_state): State<AppState>) -> Json<RegistrationQuote> {
    Json(app_state.registration_service.quote())
}
