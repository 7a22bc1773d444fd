use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};

use crate::{
    AppState,
    controller::CrudRequest,
    envelope::{ApiResponse, Envelope, FAILURE_ERRCODE},
    extractors::PostedParams,
    query::ListParams,
};

/// dispatch
///
/// Resolves the controller for `resource` and hands it the request. Unknown resources
/// get a 404 envelope before any gate runs.
async fn dispatch(
    state: &AppState,
    resource: &str,
    headers: &HeaderMap,
    request: CrudRequest,
) -> ApiResponse {
    match state.controllers.resolve(resource, &state.models) {
        Some(controller) => {
            controller
                .dispatch(request, headers, &state.models, &state.config)
                .await
        }
        None => {
            tracing::debug!(resource, "no controller or model registered");
            ApiResponse::error(format!("resource `{resource}` not found"), FAILURE_ERRCODE)
                .with_status(StatusCode::NOT_FOUND)
        }
    }
}

/// list_records
///
/// Lists rows of a resource. Query parameters naming model fields become equality
/// filters; `order`, `field`, `page` and `size` shape the result.
#[utoipa::path(
    get,
    path = "/api/{resource}",
    params(("resource" = String, Path, description = "Resource (table) name"), ListParams),
    responses(
        (status = 200, description = "Rows, or an error envelope", body = Envelope),
        (status = 400, description = "Auth gate rejection", body = Envelope),
        (status = 404, description = "Unknown resource", body = Envelope)
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResponse {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => return ApiResponse::failure(e.body_text()),
    };
    dispatch(&state, &resource, &headers, CrudRequest::Index(params)).await
}

/// create_record
///
/// Inserts a row and returns `{id}`.
#[utoipa::path(
    post,
    path = "/api/{resource}",
    params(("resource" = String, Path, description = "Resource (table) name")),
    request_body(content = Object, description = "Column values", content_type = "application/json"),
    responses(
        (status = 200, description = "Created id, or an error envelope", body = Envelope),
        (status = 400, description = "Auth gate rejection", body = Envelope)
    )
)]
pub async fn create_record(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    body: Result<PostedParams, ApiResponse>,
) -> ApiResponse {
    let body = body.map(|PostedParams(params)| params);
    dispatch(&state, &resource, &headers, CrudRequest::Save(body)).await
}

/// read_record
#[utoipa::path(
    get,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Resource (table) name"),
        ("id" = i64, Path, description = "Primary key")
    ),
    responses(
        (status = 200, description = "The record, or an error envelope", body = Envelope),
        (status = 400, description = "Auth gate rejection", body = Envelope)
    )
)]
pub async fn read_record(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResponse {
    dispatch(&state, &resource, &headers, CrudRequest::Read(id)).await
}

/// update_record
///
/// Updates the posted columns of one row. Unknown columns and `id` are ignored.
#[utoipa::path(
    put,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Resource (table) name"),
        ("id" = i64, Path, description = "Primary key")
    ),
    request_body(content = Object, description = "Column values", content_type = "application/json"),
    responses(
        (status = 200, description = "Updated id, or an error envelope", body = Envelope),
        (status = 400, description = "Auth gate rejection", body = Envelope)
    )
)]
pub async fn update_record(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<PostedParams, ApiResponse>,
) -> ApiResponse {
    let body = body.map(|PostedParams(params)| params);
    dispatch(&state, &resource, &headers, CrudRequest::Update(id, body)).await
}

/// delete_record
///
/// Soft-deletes one row by writing the status sentinel; the row is kept.
#[utoipa::path(
    delete,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Resource (table) name"),
        ("id" = i64, Path, description = "Primary key")
    ),
    responses(
        (status = 200, description = "Deleted, or an error envelope", body = Envelope),
        (status = 400, description = "Auth gate rejection", body = Envelope)
    )
)]
pub async fn delete_record(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResponse {
    dispatch(&state, &resource, &headers, CrudRequest::Delete(id)).await
}
