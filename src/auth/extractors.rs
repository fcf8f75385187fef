use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Authenticated caller. Protected handlers take it as an argument and pass
/// the user ID on to the services explicitly.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let keys = JwtKeys::from_ref(state);
        Ok(AuthUser(keys.validate(token)?))
    }
}

/// Expects `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

    let (scheme, token) = auth
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("invalid auth scheme"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("invalid auth scheme"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("missing bearer token"));
    }
    Ok(token)
}
