#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use center_console::config::AppConfig;
use center_console::http::HttpTransport;
use center_console::session::{Session, TokenStore};
use center_console::tenant::TenantStore;

pub const PLATFORM_KEY: &str = "platform-key";
pub const PASSWORD: &str = "secret";

/// Mutable state behind the fake backend
#[derive(Default)]
pub struct Backend {
    issued: AtomicUsize,
    valid_token: Mutex<Option<String>>,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub seen_api_keys: Mutex<Vec<String>>,
}

impl Backend {
    fn issue(&self) -> String {
        let token = format!("token-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1);
        *self.valid_token.lock().unwrap() = Some(token.clone());
        token
    }

    /// Invalidate the current token so the next protected call gets a 401
    pub fn expire_token(&self) {
        *self.valid_token.lock().unwrap() = Some("rotated-away".to_string());
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let valid = self.valid_token.lock().unwrap().clone();
        match (bearer(headers), valid) {
            (Some(sent), Some(valid)) => sent == valid,
            _ => false,
        }
    }

    fn record_api_key(&self, headers: &HeaderMap) {
        if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            self.seen_api_keys.lock().unwrap().push(key.to_string());
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthenticated." }))).into_response()
}

async fn resolve_center(Path(slug): Path<String>) -> Response {
    match slug.as_str() {
        "center-01" => Json(json!({
            "data": {
                "id": 225,
                "slug": "center-01",
                "name": "Updated Name",
                "api_key": "tenant-api-key",
                "branding": { "logo_url": "https://cdn.example.com/logo.png" }
            }
        }))
        .into_response(),
        "keyless" => Json(json!({ "id": 7, "slug": "keyless", "name": "Keyless" })).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "Center not found" }))).into_response(),
    }
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" }))).into_response();
    }
    let token = backend.issue();
    Json(json!({
        "data": {
            "user": { "id": 1, "name": "Ada", "email": body["email"] },
            "token": token
        }
    }))
    .into_response()
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.record_api_key(&headers);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": { "user": { "id": 1, "name": "Ada", "email": "ada@example.com" } } })).into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Slow enough that concurrent 401s overlap with the refresh
    tokio::time::sleep(Duration::from_millis(50)).await;
    if backend.refresh_fails.load(Ordering::SeqCst) || bearer(&headers).is_none() {
        return unauthorized();
    }
    // Refresh answers with the flat shape to exercise both envelopes
    Json(json!({ "token": backend.issue() })).into_response()
}

async fn logout(State(backend): State<Arc<Backend>>) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}

pub struct FakeApi {
    pub base_url: String,
    pub backend: Arc<Backend>,
}

/// Serve the fake API on a free local port for the lifetime of the test runtime
pub async fn spawn_backend() -> Result<FakeApi> {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/resolve/centers/:slug", get(resolve_center))
        .route("/api/admin/auth/login", post(login))
        .route("/api/admin/auth/me", get(me))
        .route("/api/admin/auth/refresh", post(refresh))
        .route("/api/admin/auth/logout", post(logout))
        .with_state(Arc::clone(&backend));

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind fake backend")?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("fake backend stopped: {}", e);
        }
    });

    Ok(FakeApi {
        base_url: format!("http://127.0.0.1:{}/api", port),
        backend,
    })
}

pub fn test_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::development();
    config.api.base_url = base_url.to_string();
    config.api.request_timeout_secs = 5;
    config.tenant.app_domain = Some("example.com".to_string());
    config.tenant.default_api_key = PLATFORM_KEY.to_string();
    config
}

/// Session over real HTTP with in-memory token storage and a private tenant store
pub fn session_for(api: &FakeApi) -> Result<Session> {
    let config = test_config(&api.base_url);
    let transport = Arc::new(HttpTransport::new(&config.api.base_url, config.api.request_timeout())?);
    Ok(Session::new(
        config,
        transport,
        TokenStore::in_memory(),
        Arc::new(TenantStore::with_default_key(PLATFORM_KEY)),
    ))
}
