use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::common::AppError;

/// Extracts and validates the bearer access token, returning the user ID.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

/// Like [`AuthUser`] but lets anonymous requests through. A header that is
/// present but invalid is still rejected.
#[derive(Debug)]
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid Authorization header".into()))?;

    // Expect "Bearer <token>"
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(Some)
        .ok_or_else(|| AppError::Auth("Invalid Authorization header".into()))
}

fn access_subject(keys: &JwtKeys, token: &str) -> Result<Uuid, AppError> {
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::Auth("Invalid or expired token".into())
    })?;
    if claims.kind != TokenKind::Access {
        return Err(AppError::Auth("Access token required".into()));
    }
    Ok(claims.sub)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Auth("Missing Authorization header".into()))?;
        access_subject(&keys, token).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        match bearer_token(parts)? {
            Some(token) => access_subject(&keys, token).map(|id| MaybeAuthUser(Some(id))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}
