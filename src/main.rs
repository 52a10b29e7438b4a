use anyhow::Context;
use axum::{extract::Extension, middleware, routing::get, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use center_console::host::{host_routing_middleware, route_prefix, HostRouting, TenantKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up APP_DOMAIN, API_BASE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = center_console::config::config();
    tracing::info!("Starting host router in {:?} mode", config.environment);
    if center_console::is_development!() && config.tenant.app_domain.is_none() {
        tracing::info!("APP_DOMAIN not set; classifying hosts by label count");
    }

    let app = app(HostRouting::new(config.tenant.app_domain.as_deref()));

    let port = std::env::var("CONSOLE_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Host router listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(routing: HostRouting) -> Router {
    Router::new()
        .route("/host", get(host))
        .layer(middleware::from_fn_with_state(routing, host_routing_middleware))
        // Health stays reachable from any host
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

async fn host(Extension(kind): Extension<TenantKind>) -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "success": true,
        "data": {
            "tenant": kind,
            "route": route_prefix(&kind),
        }
    }))
}

async fn health() -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}
