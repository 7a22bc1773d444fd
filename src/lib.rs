use axum::{
    Router,
    http::{HeaderName, Method, header},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Auth gate, configuration and the response envelope.
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;

// Generic CRUD dispatch.
pub mod controller;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod models;
pub mod query;

// Models (data access).
pub mod memory;
pub mod repository;

pub mod routes;
use routes::{public, resources};

// --- Public Re-exports ---

pub use auth::{AuthPolicy, Principal};
pub use config::AppConfig;
pub use controller::{ControllerRegistry, ModelRegistry, ResourceController};
pub use envelope::{ApiResponse, Envelope};
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// OpenAPI description of the generic resource routes, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_records, handlers::create_record, handlers::read_record,
        handlers::update_record, handlers::delete_record
    ),
    components(schemas(envelope::Envelope, models::CreatedId)),
    tags((name = "admin-api", description = "Generic CRUD admin API"))
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable per-process state, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub models: Arc<ModelRegistry>,
    pub controllers: Arc<ControllerRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, models: ModelRegistry, controllers: ControllerRegistry) -> Self {
        Self {
            config,
            models: Arc::new(models),
            controllers: Arc::new(controllers),
        }
    }
}

/// create_router
///
/// Assembles the routes, the observability layers and the CORS policy.
pub fn create_router(state: AppState) -> Router {
    // Preflight answers mirror the headers every envelope carries.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            HeaderName::from_static("xx-device-type"),
            HeaderName::from_static("xx-token"),
            header::AUTHORIZATION,
        ]);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(resources::resource_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags every log line of a request with its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
