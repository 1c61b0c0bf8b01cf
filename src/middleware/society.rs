// src/middleware/society.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{
    common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser,
    models::society::SocietyStatus,
};

const SOCIETY_ID_HEADER: &str = "x-society-id";

/// Society the caller is acting for, taken from the `x-society-id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocietyContext(pub i64);

impl SocietyContext {
    fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        let value = parts
            .headers
            .get(SOCIETY_ID_HEADER)
            .ok_or_else(|| AppError::InvalidInput("The x-society-id header is required".into()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(SocietyContext)
            .ok_or_else(|| AppError::InvalidInput("Invalid x-society-id header".into()))
    }
}

impl<S> FromRequestParts<S> for SocietyContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<SocietyContext>() {
            return Ok(*ctx);
        }
        Self::from_parts(parts)
    }
}

/// Lets the request through only for members of the society, and only while its
/// subscription is active. Runs after `auth_guard`.
pub async fn society_guard(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    society: SocietyContext,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    user.member_of(society.0)?;

    let status = app_state
        .society_repo
        .find_status(society.0)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Society {} not found", society.0)))?;

    if status != SocietyStatus::Active {
        tracing::info!(society_id = society.0, ?status, "request blocked, society not active");
        return Err(AppError::SocietyInactive);
    }

    request.extensions_mut().insert(society);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = HttpRequest::builder().uri("/api/bills/society/7");
        if let Some(value) = header {
            builder = builder.header(SOCIETY_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_is_parsed() {
        assert_eq!(SocietyContext::from_parts(&parts(Some("7"))).unwrap(), SocietyContext(7));
    }

    #[test]
    fn missing_or_garbage_header_is_a_bad_request() {
        assert!(matches!(SocietyContext::from_parts(&parts(None)), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            SocietyContext::from_parts(&parts(Some("seven"))),
            Err(AppError::InvalidInput(_))
        ));
    }
}
