use admin_api::{
    AppConfig, AuthPolicy, Principal,
    auth::{Claims, ClaimsData, authenticate, authorize},
    envelope::ApiResponse,
    error::AuthError,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;

const SECRET: &str = "auth-test-secret";

// --- Helpers ---

fn config() -> AppConfig {
    AppConfig {
        jwt_secret: SECRET.to_string(),
        admin_user_type: 1,
        ..AppConfig::default()
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn claims(user_id: i64, user_type: i64, exp: Option<u64>) -> Claims {
    Claims {
        data: ClaimsData {
            user_id,
            user_type,
            user: json!({ "name": "ops", "email": "ops@example.com" }),
        },
        exp,
        iat: Some(now()),
    }
}

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

// --- authenticate ---

#[test]
fn test_valid_token_yields_principal() {
    let token = sign(&claims(42, 1, Some(now() + 3600)), SECRET);

    let principal = authenticate(&headers_with(&token), &config()).unwrap();

    assert_eq!(
        principal,
        Principal {
            user_id: 42,
            user_type: 1,
            user: json!({ "name": "ops", "email": "ops@example.com" }),
        }
    );
}

#[test]
fn test_bearer_prefix_is_accepted() {
    let token = sign(&claims(7, 2, Some(now() + 3600)), SECRET);

    let principal = authenticate(&headers_with(&format!("Bearer {token}")), &config()).unwrap();

    assert_eq!(principal.user_id, 7);
    assert_eq!(principal.user_type, 2);
}

#[test]
fn test_token_without_exp_is_accepted() {
    let token = sign(&claims(3, 2, None), SECRET);

    assert!(authenticate(&headers_with(&token), &config()).is_ok());
}

#[test]
fn test_missing_header_is_token_missing() {
    let result = authenticate(&HeaderMap::new(), &config());
    assert_eq!(result, Err(AuthError::TokenMissing));
}

#[test]
fn test_blank_header_is_token_missing() {
    assert_eq!(
        authenticate(&headers_with("   "), &config()),
        Err(AuthError::TokenMissing)
    );
    assert_eq!(
        authenticate(&headers_with("Bearer "), &config()),
        Err(AuthError::TokenMissing)
    );
}

#[test]
fn test_bare_scheme_is_token_missing() {
    for value in ["Bearer", "bearer", "  BEARER  "] {
        assert_eq!(
            authenticate(&headers_with(value), &config()),
            Err(AuthError::TokenMissing),
            "{value:?}"
        );
    }
}

#[test]
fn test_scheme_is_case_insensitive() {
    let token = sign(&claims(8, 2, Some(now() + 3600)), SECRET);

    let principal = authenticate(&headers_with(&format!("bearer  {token}")), &config()).unwrap();

    assert_eq!(principal.user_id, 8);
}

#[test]
fn test_wrong_secret_is_token_invalid() {
    let token = sign(&claims(1, 1, Some(now() + 3600)), "someone-else");

    assert_eq!(
        authenticate(&headers_with(&token), &config()),
        Err(AuthError::TokenInvalid)
    );
}

#[test]
fn test_expired_token_is_token_invalid() {
    let token = sign(&claims(1, 1, Some(now() - 3600)), SECRET);

    assert_eq!(
        authenticate(&headers_with(&token), &config()),
        Err(AuthError::TokenInvalid)
    );
}

#[test]
fn test_garbage_is_token_invalid() {
    assert_eq!(
        authenticate(&headers_with("abc.def.ghi"), &config()),
        Err(AuthError::TokenInvalid)
    );
}

#[test]
fn test_token_without_identity_claims_is_invalid() {
    let token = encode(
        &Header::default(),
        &json!({ "sub": "42", "exp": now() + 3600 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert_eq!(
        authenticate(&headers_with(&token), &config()),
        Err(AuthError::TokenInvalid)
    );
}

// --- authorize / AuthPolicy ---

#[test]
fn test_authorize_compares_user_type() {
    let principal = Principal {
        user_id: 1,
        user_type: 2,
        user: json!(null),
    };

    assert_eq!(authorize(&principal, 2), Ok(()));
    assert_eq!(authorize(&principal, 1), Err(AuthError::PermissionDenied));
}

#[test]
fn test_public_policy_ignores_headers() {
    assert_eq!(AuthPolicy::Public.gate(&HeaderMap::new(), &config()), Ok(None));
    assert_eq!(
        AuthPolicy::Public.gate(&headers_with("junk"), &config()),
        Ok(None)
    );
}

#[test]
fn test_authenticated_policy_admits_any_role() {
    let token = sign(&claims(5, 3, Some(now() + 60)), SECRET);

    let principal = AuthPolicy::Authenticated
        .gate(&headers_with(&token), &config())
        .unwrap()
        .unwrap();

    assert_eq!(principal.user_type, 3);
}

#[test]
fn test_admin_policy_requires_admin_type() {
    let editor = sign(&claims(5, 3, Some(now() + 60)), SECRET);
    let admin = sign(&claims(6, 1, Some(now() + 60)), SECRET);

    assert_eq!(
        AuthPolicy::Admin.gate(&headers_with(&editor), &config()),
        Err(AuthError::PermissionDenied)
    );
    assert!(
        AuthPolicy::Admin
            .gate(&headers_with(&admin), &config())
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_admin_policy_checks_token_before_role() {
    assert_eq!(
        AuthPolicy::Admin.gate(&HeaderMap::new(), &config()),
        Err(AuthError::TokenMissing)
    );
}

#[test]
fn test_policy_parse() {
    assert_eq!(AuthPolicy::parse(" ADMIN "), Some(AuthPolicy::Admin));
    assert_eq!(AuthPolicy::parse("public"), Some(AuthPolicy::Public));
    assert_eq!(AuthPolicy::parse("authenticated"), Some(AuthPolicy::Authenticated));
    assert_eq!(AuthPolicy::parse("root"), None);
}

// --- Rejection envelopes ---

#[test]
fn test_rejections_use_code_table_and_400() {
    let codes = config().api_codes;

    let missing = ApiResponse::auth(AuthError::TokenMissing, &codes);
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.envelope.errcode, 10001);
    assert_eq!(missing.envelope.msg, "token missing");
    assert_eq!(missing.envelope.data, json!([]));

    let invalid = ApiResponse::auth(AuthError::TokenInvalid, &codes);
    assert_eq!(invalid.envelope.errcode, 10002);

    let denied = ApiResponse::auth(AuthError::PermissionDenied, &codes);
    assert_eq!(denied.envelope.errcode, 10003);
    assert_eq!(denied.envelope.msg, "permission denied");
}
