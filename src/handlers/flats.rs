// src/handlers/flats.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, society::SocietyContext},
    models::society::{FlatResidency, PayerResponse},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResidentPayload {
    #[validate(range(min = 1, message = "residentId is required"))]
    pub resident_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PayerQuery {
    /// Instant to resolve for; defaults to now.
    pub as_of: Option<DateTime<Utc>>,
}

#[utoipa::path(
    patch,
    path = "/api/flats/{flat_id}/resident",
    tag = "Flats",
    request_body = UpdateResidentPayload,
    responses(
        (status = 200, description = "Open residency after the change", body = FlatResidency),
        (status = 403, description = "Flat belongs to another society"),
        (status = 404, description = "Flat or user not found")
    ),
    params(
        ("flat_id" = i64, Path, description = "Flat ID"),
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_resident(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    society: SocietyContext,
    Path(flat_id): Path<i64>,
    Json(payload): Json<UpdateResidentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    tracing::info!(user_id = user.user_id, flat_id, resident_id = payload.resident_id, "resident change requested");

    let residency = app_state
        .residency_service
        .reassign_resident(flat_id, society.0, payload.resident_id)
        .await?;

    Ok(Json(residency))
}

#[utoipa::path(
    get,
    path = "/api/flats/{flat_id}/payer",
    tag = "Flats",
    responses(
        (status = 200, description = "Who pays the flat's bill at that instant", body = PayerResponse),
        (status = 404, description = "Flat not found")
    ),
    params(
        ("flat_id" = i64, Path, description = "Flat ID"),
        PayerQuery,
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_payer(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    society: SocietyContext,
    Path(flat_id): Path<i64>,
    Query(query): Query<PayerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let as_of = query.as_of.unwrap_or_else(Utc::now);

    let payer = app_state
        .residency_service
        .resolve_payer(flat_id, society.0, as_of)
        .await?;

    Ok(Json(payer))
}
