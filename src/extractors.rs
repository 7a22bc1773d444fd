//! # Custom Extractors
//!
//! Request extractors that reject with an envelope instead of axum's plain-text bodies.

use std::collections::HashMap;

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header,
};
use serde_json::Value;

use crate::{envelope::ApiResponse, models::Record};

/// PostedParams
///
/// The key/value body of a create or update request. Accepts
/// `application/x-www-form-urlencoded` (values arrive as strings) and JSON objects.
#[derive(Debug, Clone)]
pub struct PostedParams(pub Record);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

impl<S> FromRequest<S> for PostedParams
where
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(map) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiResponse::failure(e.body_text()))?;
            return Ok(PostedParams(
                map.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
            ));
        }

        let Json(record) = Json::<Record>::from_request(req, state)
            .await
            .map_err(|e| ApiResponse::failure(e.body_text()))?;
        Ok(PostedParams(record))
    }
}
