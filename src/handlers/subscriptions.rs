// src/handlers/subscriptions.rs

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
    middleware::auth::AuthenticatedUser,
    models::subscription::{InitiateSubscriptionPayload, InitiatedSubscription, Subscription},
};

#[utoipa::path(
    post,
    path = "/api/subscriptions/initiate",
    tag = "Subscriptions",
    request_body = InitiateSubscriptionPayload,
    responses(
        (status = 200, description = "Gateway session opened", body = InitiatedSubscription),
        (status = 403, description = "Caller belongs to another society"),
        (status = 404, description = "Society not found"),
        (status = 502, description = "Gateway rejected or unreachable")
    ),
    security(("api_jwt" = []))
)]
pub async fn initiate_subscription(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<InitiateSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    user.member_of(payload.society_id)?;

    let initiated = app_state
        .subscription_service
        .initiate(Some(user.user_id), payload)
        .await?;

    Ok(Json(initiated))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/success",
    tag = "Subscriptions",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the frontend page for the resulting status")
    )
)]
pub async fn subscription_callback(State(app_state): State<AppState>, body: Bytes) -> Response {
    let service = &app_state.subscription_service;

    let outcome = async {
        let cb = callback::parse(&body)?;
        let subscription = service.handle_callback(&cb).await?;
        Ok::<_, AppError>(Reconciled {
            id: subscription.id,
            tran_id: subscription.tran_id,
            status: subscription.status,
        })
    }
    .await;

    callback::respond("subscription", service.urls(), outcome)
}

#[utoipa::path(
    get,
    path = "/api/subscriptions/society/{society_id}",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Subscription history, newest first", body = Vec<Subscription>),
        (status = 403, description = "Caller belongs to another society")
    ),
    params(
        ("society_id" = i64, Path, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn subscription_history(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(society_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.member_of(society_id)?;
    let history = app_state.subscription_service.history(society_id).await?;
    Ok(Json(history))
}
