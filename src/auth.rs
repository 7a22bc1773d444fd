use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::AppConfig, error::AuthError};

/// Claims
///
/// The payload carried inside the signed token. Identity lives under `data`;
/// `exp`/`iat` are optional, and `exp` is enforced only when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub data: ClaimsData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// ClaimsData
///
/// Identity claims: numeric user id, numeric user type (role) and an opaque user payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsData {
    pub user_id: i64,
    pub user_type: i64,
    #[serde(default)]
    pub user: Value,
}

/// Principal
///
/// The resolved identity of an authenticated request. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: i64,
    /// Role discriminator; compared against `AppConfig::admin_user_type` for admin routes.
    pub user_type: i64,
    pub user: Value,
}

impl From<ClaimsData> for Principal {
    fn from(data: ClaimsData) -> Self {
        Self {
            user_id: data.user_id,
            user_type: data.user_type,
            user: data.user,
        }
    }
}

/// authenticate
///
/// Runs the auth gate over the request headers:
/// 1. Reads the `Authorization` header (an optional `Bearer ` prefix is accepted).
/// 2. Verifies the HS256 signature against `config.jwt_secret`.
/// 3. Maps the decoded claims onto a `Principal`.
pub fn authenticate(headers: &HeaderMap, config: &AppConfig) -> Result<Principal, AuthError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::TokenInvalid))
        .transpose()?
        .unwrap_or_default();

    let token = strip_bearer(raw);
    if token.is_empty() {
        return Err(AuthError::TokenMissing);
    }

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Tokens without `exp` are accepted; expired ones are not.
    validation.set_required_spec_claims::<&str>(&[]);
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(Principal::from(token_data.claims.data)),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            Err(AuthError::TokenInvalid)
        }
    }
}

/// The credential without its optional `Bearer` scheme (matched case-insensitively).
/// A bare scheme with no credential yields an empty string.
fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if raw.eq_ignore_ascii_case("bearer") => "",
        _ => raw,
    }
}

/// Role gate applied after authentication.
pub fn authorize(principal: &Principal, required_user_type: i64) -> Result<(), AuthError> {
    if principal.user_type == required_user_type {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

/// AuthPolicy
///
/// How much of the gate a controller runs during initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// No credential required.
    Public,
    /// Any valid token.
    Authenticated,
    /// A valid token whose `userType` equals the configured admin type.
    Admin,
}

impl AuthPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Some(AuthPolicy::Public),
            "authenticated" => Some(AuthPolicy::Authenticated),
            "admin" => Some(AuthPolicy::Admin),
            _ => None,
        }
    }

    /// Applies the policy. `Public` never inspects the headers and yields no principal.
    pub fn gate(
        &self,
        headers: &HeaderMap,
        config: &AppConfig,
    ) -> Result<Option<Principal>, AuthError> {
        match self {
            AuthPolicy::Public => Ok(None),
            AuthPolicy::Authenticated => authenticate(headers, config).map(Some),
            AuthPolicy::Admin => {
                let principal = authenticate(headers, config)?;
                authorize(&principal, config.admin_user_type)?;
                Ok(Some(principal))
            }
        }
    }
}
