use admin_api::{
    AppState, ControllerRegistry, ModelRegistry, PostgresRepository,
    config::{AppConfig, Env},
    create_router,
    repository::RepositoryState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database pool, model registration and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "admin_api=debug,tower_http=info".into());

    // 3. Pretty logs locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // 5. One table-backed model per configured resource.
    let mut models = ModelRegistry::new();
    for table in &config.resources {
        let repo = PostgresRepository::new(pool.clone(), table.as_str())
            .unwrap_or_else(|e| panic!("FATAL: cannot expose resource {table}: {e}"));
        models.register(Arc::new(repo) as RepositoryState);
        tracing::info!("Exposing resource /api/{}", table);
    }
    if config.resources.is_empty() {
        tracing::warn!("RESOURCES is empty; no resource routes will resolve");
    }

    // 6. Controllers. Resources without a dedicated controller use the default policy.
    let controllers = ControllerRegistry::new(config.default_policy);

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(config, models, controllers));

    // 7. Server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}
