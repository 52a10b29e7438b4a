use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::state::{Branding, CenterId, TenantPatch, TenantState};
use crate::error::SessionError;
use crate::http::{pipeline, ApiRequest, Transport};

/// Canonical result of a center lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCenter {
    pub api_key: String,
    pub center_id: Option<CenterId>,
    pub center_slug: Option<String>,
    pub center_name: Option<String>,
    pub branding: Option<Branding>,
}

impl ResolvedCenter {
    /// Full tenant patch marking resolution complete. A center without its
    /// own key keeps the platform default.
    pub fn into_patch(self, default_api_key: &str) -> TenantPatch {
        let api_key = if self.api_key.is_empty() {
            default_api_key.to_string()
        } else {
            self.api_key
        };

        TenantPatch {
            api_key: Some(api_key),
            center_id: Some(self.center_id),
            center_slug: Some(self.center_slug),
            center_name: Some(self.center_name),
            branding: Some(self.branding),
            is_resolved: Some(true),
        }
    }
}

/// Wire payload of the resolution endpoint. Every known spelling is a
/// separate field; `normalize` picks the first present.
#[derive(Debug, Default, Deserialize)]
struct CenterPayload {
    api_key: Option<String>,
    #[serde(rename = "apiKey")]
    api_key_camel: Option<String>,
    center_id: Option<CenterId>,
    #[serde(rename = "centerId")]
    center_id_camel: Option<CenterId>,
    id: Option<CenterId>,
    center_slug: Option<String>,
    #[serde(rename = "centerSlug")]
    center_slug_camel: Option<String>,
    slug: Option<String>,
    name: Option<String>,
    center_name: Option<String>,
    #[serde(rename = "centerName")]
    center_name_camel: Option<String>,
    branding: Option<BrandingPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct BrandingPayload {
    logo_url: Option<String>,
    #[serde(rename = "logoUrl")]
    logo_url_camel: Option<String>,
    primary_color: Option<String>,
    #[serde(rename = "primaryColor")]
    primary_color_camel: Option<String>,
}

/// Known response envelopes
#[derive(Debug)]
enum ResolveEnvelope {
    /// `{ "data": { ... } }` or `{ "data": null }`
    Wrapped(Option<CenterPayload>),
    /// The payload at the top level
    Flat(CenterPayload),
}

impl ResolveEnvelope {
    fn from_json(value: Value) -> Result<Self, SessionError> {
        let Value::Object(mut object) = value else {
            return Err(SessionError::invalid_response("center resolution body is not an object"));
        };

        match object.remove("data") {
            Some(Value::Null) => Ok(ResolveEnvelope::Wrapped(None)),
            Some(data) => Ok(ResolveEnvelope::Wrapped(Some(serde_json::from_value(data)?))),
            None => Ok(ResolveEnvelope::Flat(serde_json::from_value(Value::Object(object))?)),
        }
    }

    fn into_center(self) -> Option<ResolvedCenter> {
        match self {
            ResolveEnvelope::Wrapped(payload) => payload.and_then(CenterPayload::normalize),
            ResolveEnvelope::Flat(payload) => payload.normalize(),
        }
    }
}

impl CenterPayload {
    /// `None` when the payload names no center at all
    fn normalize(self) -> Option<ResolvedCenter> {
        let api_key = self.api_key.or(self.api_key_camel).unwrap_or_default();
        let center_id = self.center_id.or(self.center_id_camel).or(self.id);
        let center_slug = self.center_slug.or(self.center_slug_camel).or(self.slug);
        let center_name = self.name.or(self.center_name).or(self.center_name_camel);

        if api_key.is_empty() && center_id.is_none() && center_slug.is_none() {
            return None;
        }

        let branding = self.branding.map(|b| Branding {
            logo_url: b.logo_url.or(b.logo_url_camel),
            primary_color: b.primary_color.or(b.primary_color_camel),
        });

        Some(ResolvedCenter {
            api_key,
            center_id,
            center_slug,
            center_name,
            branding,
        })
    }
}

/// Normalize a resolution response body into the canonical shape
pub fn normalize_center_response(body: Value) -> Result<Option<ResolvedCenter>, SessionError> {
    Ok(ResolveEnvelope::from_json(body)?.into_center())
}

/// Looks up a center by slug on the public resolution endpoint
pub struct TenantResolver {
    transport: Arc<dyn Transport>,
    locale: String,
}

impl TenantResolver {
    pub fn new(transport: Arc<dyn Transport>, locale: &str) -> Self {
        Self {
            transport,
            locale: locale.to_string(),
        }
    }

    /// `Ok(None)` when no center matches; transport and parse failures are errors.
    pub async fn resolve_center(&self, slug: &str) -> Result<Option<ResolvedCenter>, SessionError> {
        let mut request = ApiRequest::get(format!("/resolve/centers/{}", slug)).skip_auth();
        // Public endpoint: locale only, no tenant key yet
        pipeline::apply_session_headers(&mut request, &TenantState::default(), &self.locale);

        let response = self.transport.execute(&request).await?;
        if response.status.as_u16() == 404 {
            tracing::info!("No center registered for slug '{}'", slug);
            return Ok(None);
        }

        let body: Value = response.error_for_status()?.json()?;
        let center = normalize_center_response(body)?;
        match &center {
            Some(center) => tracing::debug!("Resolved slug '{}' to center {:?}", slug, center.center_id),
            None => tracing::info!("Resolution endpoint returned no center for '{}'", slug),
        }
        Ok(center)
    }
}
