//! Signed session tokens: short-lived access tokens and long-lived refresh tokens.
//!
//! Both kinds are HS256 JWTs signed with the same secret. They differ only in claim shape,
//! and both claim structs deny unknown fields, so decoding one kind with the other's schema
//! fails. Verification goes through the single [`TokenCodec::verify`] entry point,
//! parameterized by the expected claims type.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::AppConfig,
    error::{AuthError, AuthResult},
    models::{Account, AccountId, RoleId},
};

/// The only algorithm tokens are signed with or accepted under.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Returned for every verification failure. The reason is logged, never exposed.
const TOKEN_REJECTED: &str = "invalid or expired token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::AccessClaims {}
    impl Sealed for super::RefreshClaims {}
}

/// TokenClaims
///
/// Implemented only by [`AccessClaims`] and [`RefreshClaims`].
pub trait TokenClaims: sealed::Sealed + Clone + Serialize + DeserializeOwned {
    const KIND: TokenKind;

    fn account_id(&self) -> AccountId;
    fn subject(&self) -> &str;
    fn issued_at(&self) -> i64;
    fn expires_at(&self) -> i64;
}

/// AccessClaims
///
/// Payload of an access token, consumed on every protected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub account_id: AccountId,
    pub username: String,
    pub role_id: RoleId,
    /// Issuer (iss).
    pub iss: String,
    /// Subject (sub): the stringified account ID.
    pub sub: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(account: &Account, issuer: &str, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            account_id: account.id,
            username: account.username.clone(),
            role_id: account.role_id,
            iss: issuer.to_string(),
            sub: account.id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }
}

impl TokenClaims for AccessClaims {
    const KIND: TokenKind = TokenKind::Access;

    fn account_id(&self) -> AccountId {
        self.account_id
    }
    fn subject(&self) -> &str {
        &self.sub
    }
    fn issued_at(&self) -> i64 {
        self.iat
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// RefreshClaims
///
/// Payload of a refresh token. Carries no role: the role is re-read from the store
/// whenever the refresh token is exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub account_id: AccountId,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn new(account: &Account, issuer: &str, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            account_id: account.id,
            iss: issuer.to_string(),
            sub: account.id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }
}

impl TokenClaims for RefreshClaims {
    const KIND: TokenKind = TokenKind::Refresh;

    fn account_id(&self) -> AccountId {
        self.account_id
    }
    fn subject(&self) -> &str {
        &self.sub
    }
    fn issued_at(&self) -> i64 {
        self.iat
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// TokenSettings
///
/// Signing secret, issuer and lifetimes. Defaults follow the policy of a 1 hour access
/// token and a 720 hour refresh token.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "authz-core".to_string(),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::hours(720),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            access_ttl: Duration::hours(config.access_ttl_hours),
            refresh_ttl: Duration::hours(config.refresh_ttl_hours),
        }
    }
}

/// TokenCodec
///
/// Stateless issuer and verifier for both token kinds. Cheap to clone; keys are shared.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: Arc<str>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenCodec {
    pub fn new(settings: TokenSettings) -> AuthResult<Self> {
        if settings.secret.is_empty() {
            return Err(AuthError::internal(
                "token codec misconfigured",
                "signing secret is empty",
            ));
        }
        if settings.secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than recommended (32 bytes)");
        }

        // Pinning the algorithm list to HS256 rejects any token whose header names another
        // algorithm before the signature is even looked at.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            issuer: Arc::from(settings.issuer.as_str()),
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            encoding_key: Arc::new(EncodingKey::from_secret(settings.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(settings.secret.as_bytes())),
            validation: Arc::new(validation),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mints an access token for `account`, valid from now for the access TTL.
    pub fn issue_access(&self, account: &Account) -> AuthResult<String> {
        let claims = AccessClaims::new(account, &self.issuer, Utc::now(), self.access_ttl);
        self.sign(&claims)
    }

    /// Mints a refresh token for `account`, valid from now for the refresh TTL.
    pub fn issue_refresh(&self, account: &Account) -> AuthResult<String> {
        let claims = RefreshClaims::new(account, &self.issuer, Utc::now(), self.refresh_ttl);
        self.sign(&claims)
    }

    /// Signs arbitrary claims of either kind. A signing failure is an internal error.
    pub fn sign<C: TokenClaims>(&self, claims: &C) -> AuthResult<String> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(
                kind = ?C::KIND,
                account_id = claims.account_id(),
                error = %e,
                "failed to sign token"
            );
            AuthError::Internal
        })
    }

    /// verify
    ///
    /// Parses `token`, checks the algorithm, signature, issuer and expiry, and decodes the
    /// payload as `C`. Every failure, including a token of the other kind, collapses to the
    /// same `Unauthorized`.
    pub fn verify<C: TokenClaims>(&self, token: &str) -> AuthResult<C> {
        let claims = decode::<C>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(kind = ?C::KIND, error = %e, "token rejected");
                AuthError::Unauthorized(TOKEN_REJECTED)
            })?;

        // The library accepts exp == now; a token is only valid while now < exp.
        if claims.expires_at() <= Utc::now().timestamp() {
            tracing::debug!(kind = ?C::KIND, "token rejected: expired");
            return Err(AuthError::Unauthorized(TOKEN_REJECTED));
        }
        if claims.subject() != claims.account_id().to_string() {
            tracing::debug!(kind = ?C::KIND, "token rejected: subject mismatch");
            return Err(AuthError::Unauthorized(TOKEN_REJECTED));
        }

        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.verify::<AccessClaims>(token)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.verify::<RefreshClaims>(token)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}
