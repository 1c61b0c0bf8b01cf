// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{common::error::AppError, config::AppState};

/// Token payload. Tokens are issued by the account service; this crate only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    #[serde(default)]
    pub society_id: Option<i64>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub society_id: Option<i64>,
}

impl AuthenticatedUser {
    /// Tokens carry the one society the user belongs to; anything else is off limits.
    pub fn member_of(&self, society_id: i64) -> Result<(), AppError> {
        if self.society_id == Some(society_id) {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "User {} is not a member of society {society_id}",
            self.user_id
        )))
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    Ok(token_data.claims)
}

pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::InvalidToken)?;

    let claims = decode_token(bearer.token(), &app_state.config.jwt_secret)?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.sub,
        society_id: claims.society_id,
    });
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: 42,
            society_id: Some(7),
            exp: (now + exp) as usize,
            iat: now as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = decode_token(&token("s3cret", 3600), "s3cret").unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.society_id, Some(7));
    }

    #[test]
    fn membership_follows_the_token_society() {
        let member = AuthenticatedUser { user_id: 42, society_id: Some(7) };
        assert!(member.member_of(7).is_ok());
        assert!(matches!(member.member_of(8), Err(AppError::Forbidden(_))));

        let unaffiliated = AuthenticatedUser { user_id: 42, society_id: None };
        assert!(matches!(unaffiliated.member_of(7), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        assert!(matches!(
            decode_token(&token("other", 3600), "s3cret"),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            decode_token(&token("s3cret", -3600), "s3cret"),
            Err(AppError::InvalidToken)
        ));
    }
}
