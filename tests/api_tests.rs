use admin_api::{
    AppConfig, AppState, AuthPolicy, ControllerRegistry, Envelope, MemoryRepository,
    ModelRegistry, ResourceController, create_router, repository::RepositoryState,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub notes: Arc<MemoryRepository>,
}

/// Serves the full router on an ephemeral port. `notes` is public so the
/// HTTP-level tests need no token.
async fn spawn_app() -> TestApp {
    let notes = Arc::new(MemoryRepository::new("notes", ["id", "body", "status"]));
    let models = ModelRegistry::new().with(notes.clone() as RepositoryState);
    let controllers = ControllerRegistry::new(AuthPolicy::Admin)
        .with(ResourceController::new("notes", AuthPolicy::Public));

    let router = create_router(AppState::new(AppConfig::default(), models, controllers));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, notes }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_note_lifecycle_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Create
    let response = client
        .post(format!("{}/api/notes", app.address))
        .json(&json!({ "body": "hello", "status": 1 }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let created: Envelope = response.json().await.unwrap();
    assert!(created.is_success());
    let id = created.data["id"].as_i64().unwrap();

    // Update
    let response = client
        .put(format!("{}/api/notes/{}", app.address, id))
        .json(&json!({ "body": "edited" }))
        .send()
        .await
        .unwrap();
    let updated: Envelope = response.json().await.unwrap();
    assert_eq!(updated.msg, "updated successfully");

    // List
    let response = client
        .get(format!("{}/api/notes?status=1", app.address))
        .send()
        .await
        .unwrap();
    let listed: Envelope = response.json().await.unwrap();
    assert_eq!(listed.data[0]["body"], "edited");

    // Soft delete
    let response = client
        .delete(format!("{}/api/notes/{}", app.address, id))
        .send()
        .await
        .unwrap();
    let deleted: Envelope = response.json().await.unwrap();
    assert_eq!(deleted.errcode, 0);
    assert_eq!(app.notes.rows().await[0]["status"], json!(-1));
}

#[tokio::test]
async fn test_malformed_json_body_is_an_envelope() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/notes", app.address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let envelope: Envelope = response.json().await.unwrap();
    assert_eq!(envelope.errcode, -1);
    assert!(app.notes.rows().await.is_empty());
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/notes", app.address))
        .header("origin", "http://admin.example.com")
        .header("access-control-request-method", "DELETE")
        .header("access-control-request-headers", "authorization")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let methods = response.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("DELETE"));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/notes", app.address))
        .send()
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
