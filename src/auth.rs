use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::AuthError,
    token::{AccessClaims, TokenCodec},
};

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: the verified access-token claims.
/// Handlers pass `Some(&claims)` to the `Authorizer` to gate the operation.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AccessClaims);

impl AuthUser {
    pub fn claims(&self) -> &AccessClaims {
        &self.0
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`. The scheme name matches
/// case-insensitively.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse the identity the authentication middleware already verified for this request.
/// 2. Otherwise resolve the `TokenCodec` from the application state, extract the bearer
///    token and verify it as an access token. A refresh token is rejected here.
///
/// Rejection: `AuthError::Unauthorized` (401) on any failure, with one fixed message.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let tokens = TokenCodec::from_ref(state);

        let token = bearer_token(parts).ok_or_else(|| {
            tracing::debug!("missing or malformed Authorization header");
            AuthError::Unauthorized("invalid or expired token")
        })?;

        let claims = tokens.verify_access(token)?;
        Ok(AuthUser(claims))
    }
}
