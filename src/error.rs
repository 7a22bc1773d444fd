//! # Error kinds
//!
//! Two tiers: gate rejections (`AuthError`, surfaced with HTTP 400 and a configured
//! code/message pair) and operation failures (surfaced with HTTP 200 and the
//! underlying message). `ApiError` unifies both for before-action hooks.

use thiserror::Error;

/// Reasons the auth gate refuses a request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization token missing")]
    TokenMissing,
    #[error("authorization token invalid")]
    TokenInvalid,
    #[error("permission denied")]
    PermissionDenied,
}

impl AuthError {
    /// Key into the `ApiCodes` table for this rejection.
    pub fn code_key(&self) -> &'static str {
        match self {
            AuthError::TokenMissing => "token_missing",
            AuthError::TokenInvalid => "token_fail",
            AuthError::PermissionDenied => "user_permission_fail",
        }
    }
}

/// Any failure a controller step can short-circuit with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Failure of the underlying data operation; the message is sent to the client verbatim.
    #[error("{0}")]
    Operation(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn operation(err: impl std::fmt::Display) -> Self {
        ApiError::Operation(err.to_string())
    }
}
