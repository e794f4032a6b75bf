use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// AuthError
///
/// The closed set of outcomes every layer of the core can fail with. Handlers return it
/// directly and the HTTP boundary maps it to a status code with an exhaustive match.
///
/// `Unauthorized` and `Forbidden` carry fixed, caller-safe strings only. `Internal` carries
/// nothing: the detail is logged where the failure happened (see [`AuthError::internal`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing/invalid/expired token or bad credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    /// Valid identity, insufficient permission.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    /// Malformed input, duplicate username, unknown role reference.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Store failure, signing failure or inconsistent data.
    #[error("internal server error")]
    Internal,
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Logs `err` with its context and collapses it into the detail-free `Internal` shape.
    pub fn internal(context: &str, err: impl Display) -> Self {
        tracing::error!(error = %err, "{}", context);
        AuthError::Internal
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        AuthError::BadRequest(details.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// Wire shape of every error response: `{ "code": 401, "message": "Unauthorized", "details": "..." }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        let (message, details) = match err {
            AuthError::Unauthorized(d) => ("Unauthorized", Some(d.to_string())),
            AuthError::Forbidden(d) => ("Forbidden", Some(d.to_string())),
            AuthError::BadRequest(d) => ("Bad Request", Some(d.clone())),
            AuthError::Internal => ("Internal server error", None),
        };
        ErrorBody {
            code: err.status_code().as_u16(),
            message,
            details,
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "request body rejected");
        AuthError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self);
        (self.status_code(), Json(body)).into_response()
    }
}
