// src/handlers/bills.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, society::SocietyContext},
    models::bill::{AssignBillPayload, BillView, GenerateBillsPayload},
};

/// Society-scoped routes act only on the society the guard admitted.
pub(crate) fn ensure_society(ctx: SocietyContext, society_id: i64) -> Result<(), AppError> {
    if ctx.0 != society_id {
        return Err(AppError::Forbidden(format!(
            "Request is scoped to society {}, not {society_id}",
            ctx.0
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/bills/generate",
    tag = "Bills",
    request_body = GenerateBillsPayload,
    responses(
        (status = 201, description = "One bill per flat", body = Vec<BillView>),
        (status = 404, description = "Society not found"),
        (status = 409, description = "Bills already generated for this month")
    ),
    params(
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn generate_bills(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    society: SocietyContext,
    Json(payload): Json<GenerateBillsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_society(society, payload.society_id)?;

    tracing::info!(user_id = user.user_id, society_id = payload.society_id, month = %payload.month, "bill generation requested");

    let bills = app_state
        .bill_service
        .generate_bills(payload.society_id, &payload.month)
        .await?;

    Ok((StatusCode::CREATED, Json(bills)))
}

#[utoipa::path(
    get,
    path = "/api/bills/society/{society_id}",
    tag = "Bills",
    responses(
        (status = 200, description = "Bills of the society, newest month first", body = Vec<BillView>)
    ),
    params(
        ("society_id" = i64, Path, description = "Society ID"),
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_society_bills(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    society: SocietyContext,
    Path(society_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_society(society, society_id)?;
    let bills = app_state.bill_service.society_bills(society_id).await?;
    Ok(Json(bills))
}

#[utoipa::path(
    get,
    path = "/api/bills/society/{society_id}/user/{user_id}",
    tag = "Bills",
    responses(
        (status = 200, description = "Bills billed to the user", body = Vec<BillView>)
    ),
    params(
        ("society_id" = i64, Path, description = "Society ID"),
        ("user_id" = i64, Path, description = "Payer user ID"),
        ("x-society-id" = i64, Header, description = "Society ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_user_bills(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    society: SocietyContext,
    Path((society_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_society(society, society_id)?;
    let bills = app_state.bill_service.user_bills(society_id, user_id).await?;
    Ok(Json(bills))
}

#[utoipa::path(
    post,
    path = "/api/bills/{bill_id}/assign",
    tag = "Bills",
    request_body = AssignBillPayload,
    responses(
        (status = 200, description = "Bill moved to the resident", body = BillView),
        (status = 403, description = "Caller is not the flat owner"),
        (status = 404, description = "Resident did not live in the flat that month"),
        (status = 409, description = "Bill already paid")
    ),
    params(
        ("bill_id" = i64, Path, description = "Bill ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_bill(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(bill_id): Path<i64>,
    Json(payload): Json<AssignBillPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let bill = app_state
        .bill_service
        .assign_to_resident(bill_id, user.user_id, payload.resident_id)
        .await?;

    Ok(Json(bill))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_society_is_forbidden() {
        assert!(ensure_society(SocietyContext(7), 7).is_ok());
        assert!(matches!(ensure_society(SocietyContext(7), 8), Err(AppError::Forbidden(_))));
    }
}
