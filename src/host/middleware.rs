use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;

use super::{classify, TenantKind};

/// Shared state for the host routing middleware
#[derive(Clone, Debug, Default)]
pub struct HostRouting {
    pub app_domain: Option<Arc<str>>,
}

impl HostRouting {
    pub fn new(app_domain: Option<&str>) -> Self {
        Self {
            app_domain: app_domain.map(Arc::from),
        }
    }
}

/// Classifies the request host and injects the resulting `TenantKind` into
/// request extensions. Unknown hosts are rejected with 404.
pub async fn host_routing_middleware(
    State(routing): State<HostRouting>,
    mut request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    let host = extract_host(request.headers()).unwrap_or_default();
    let kind = classify(&host, routing.app_domain.as_deref());

    if route_prefix(&kind).is_none() {
        tracing::warn!("Rejecting request for unrecognised host '{}'", host);
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": true,
                "message": format!("Unknown host '{}'", host),
                "code": "UNKNOWN_HOST"
            })),
        ));
    }

    tracing::debug!("Host '{}' classified as {}", host, kind.label());
    request.extensions_mut().insert(kind);

    Ok(next.run(request).await)
}

/// Console area serving a tenant kind. `None` for hosts nothing should serve.
pub fn route_prefix(kind: &TenantKind) -> Option<String> {
    match kind {
        TenantKind::Apex => Some("/".to_string()),
        TenantKind::Admin => Some("/platform".to_string()),
        TenantKind::Center { slug } => Some(format!("/center/{}", slug)),
        TenantKind::Unknown => None,
    }
}

/// `X-Forwarded-Host` wins over `Host` when a proxy set it
fn extract_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
