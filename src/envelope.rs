use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    config::ApiCodes,
    error::{ApiError, AuthError},
};

// --- CORS policy attached to every envelope ---

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str =
    "X-Requested-With,Content-Type,XX-Device-Type,XX-Token,Authorization";
pub const ALLOW_METHODS: &str = "GET,POST,PATCH,PUT,DELETE,OPTIONS";

/// Errcode for generic operation failures.
pub const FAILURE_ERRCODE: i64 = -1;

/// Envelope
///
/// The uniform response body of every API endpoint.
/// `errcode == 0` exactly when the request succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Envelope {
    pub errcode: i64,
    pub msg: String,
    /// Payload; an empty array on failure.
    #[schema(value_type = Object)]
    #[ts(type = "unknown")]
    pub data: Value,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.errcode == 0
    }
}

/// ApiResponse
///
/// An `Envelope` paired with the HTTP status it is sent with.
/// Converting it into an axum `Response` attaches the CORS headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl ApiResponse {
    /// A success envelope (`errcode = 0`, HTTP 200).
    pub fn success(msg: impl Into<String>, data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Envelope {
                errcode: 0,
                msg: msg.into(),
                data,
            },
        }
    }

    /// A failure envelope with an empty payload, sent with HTTP 200.
    pub fn error(msg: impl Into<String>, errcode: i64) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Envelope {
                errcode,
                msg: msg.into(),
                data: Value::Array(Vec::new()),
            },
        }
    }

    /// Generic operation failure: errcode `-1` and the failure's display text as `msg`.
    pub fn failure(err: impl std::fmt::Display) -> Self {
        Self::error(err.to_string(), FAILURE_ERRCODE)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Gate rejections are always HTTP 400 with the configured code/message pair.
    pub fn auth(err: AuthError, codes: &ApiCodes) -> Self {
        let key = err.code_key();
        Self::error(codes.msg(key), codes.errcode(key)).with_status(StatusCode::BAD_REQUEST)
    }

    pub fn from_error(err: ApiError, codes: &ApiCodes) -> Self {
        match err {
            ApiError::Auth(auth) => Self::auth(auth, codes),
            ApiError::Operation(msg) => Self::error(msg, FAILURE_ERRCODE),
            ApiError::NotFound(msg) => {
                Self::error(msg, FAILURE_ERRCODE).with_status(StatusCode::NOT_FOUND)
            }
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
                (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
            ],
            Json(self.envelope),
        )
            .into_response()
    }
}
