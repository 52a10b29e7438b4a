use chrono::{DateTime, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::token_store::{TokenStore, Tokens};
use crate::config::{AppConfig, SessionConfig};
use crate::error::SessionError;
use crate::http::{pipeline, ApiRequest, Transport};
use crate::tenant::TenantStore;

type SharedRefresh = Shared<BoxFuture<'static, Result<String, SessionError>>>;

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owns the refresh primitive and the proactive renewal timer.
///
/// Concurrent `refresh_token` callers share one in-flight call. At most one
/// timer is armed at a time.
pub struct RefreshScheduler {
    config: Arc<AppConfig>,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    tenant: Arc<TenantStore>,
    in_flight: Mutex<Option<SharedRefresh>>,
    timer: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(
        config: Arc<AppConfig>,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        tenant: Arc<TenantStore>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            tenant,
            in_flight: Mutex::new(None),
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Renew the access token, joining a refresh already in flight.
    pub async fn refresh_token(self: &Arc<Self>) -> Result<String, SessionError> {
        let in_flight = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(refresh) => {
                    tracing::debug!("Joining in-flight token refresh");
                    refresh.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let refresh = async move { this.perform_refresh().await }.boxed().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = in_flight.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&in_flight)) {
            *slot = None;
        }

        result
    }

    async fn perform_refresh(self: Arc<Self>) -> Result<String, SessionError> {
        let current = self
            .tokens
            .get_access_token()
            .ok_or_else(|| SessionError::not_authenticated("no access token to refresh"))?;

        let mut request = ApiRequest::post(self.config.api.auth_path("refresh")).skip_auth();
        pipeline::apply_session_headers(&mut request, &self.tenant.get(), &self.config.tenant.locale);
        request.set_bearer(&current);

        let response = self.transport.execute(&request).await?.error_for_status()?;
        let token = response.json::<RefreshEnvelope>()?.into_token();
        if token.is_empty() {
            return Err(SessionError::invalid_response("refresh response carried an empty token"));
        }

        self.tokens.set_tokens(&Tokens {
            access_token: token.clone(),
        });
        tracing::info!("Access token refreshed");

        self.schedule_token_refresh();
        Ok(token)
    }

    /// Arm the proactive renewal timer, replacing any armed one.
    pub fn schedule_token_refresh(self: &Arc<Self>) {
        let Some(token) = self.tokens.get_access_token() else {
            tracing::debug!("No access token stored; not scheduling a refresh");
            self.cancel_token_refresh();
            return;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No async runtime available; proactive token refresh disabled");
                return;
            }
        };

        let delay = refresh_delay(&token, Utc::now(), &self.config.session);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let scheduler = Arc::downgrade(self);

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.handle.abort();
        }

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(scheduler) = scheduler.upgrade() else {
                return;
            };
            if !scheduler.disarm(generation) {
                return;
            }

            tracing::info!("Proactively refreshing access token");
            if let Err(e) = scheduler.refresh_token().await {
                tracing::warn!("Proactive token refresh failed, ending session: {}", e);
                scheduler.end_session();
            }
        });

        tracing::debug!("Token refresh scheduled in {}s", delay.as_secs());
        *timer = Some(ArmedTimer { generation, handle });
    }

    /// Disarm the timer. No-op when nothing is armed.
    pub fn cancel_token_refresh(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(armed) = timer.take() {
            armed.handle.abort();
            tracing::debug!("Token refresh timer cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Clear stored credentials and stop renewal
    pub fn end_session(&self) {
        self.tokens.clear();
        self.cancel_token_refresh();
    }

    // Called by the firing timer: release the slot without aborting itself.
    // False when a newer timer replaced this one.
    fn disarm(&self, generation: u64) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match timer.as_ref() {
            Some(armed) if armed.generation == generation => {
                *timer = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel_token_refresh();
    }
}

/// Known shapes of the refresh endpoint's body
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshEnvelope {
    Wrapped { data: TokenPayload },
    Flat(TokenPayload),
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(alias = "access_token")]
    token: String,
}

impl RefreshEnvelope {
    fn into_token(self) -> String {
        match self {
            RefreshEnvelope::Wrapped { data } | RefreshEnvelope::Flat(data) => data.token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// `exp` of a JWT-shaped token. Claims are read, the signature is not checked.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    Utc.timestamp_opt(data.claims.exp?, 0).single()
}

/// Time until the proactive refresh: `margin` before a readable expiry,
/// otherwise the fallback interval. Never shorter than the minimum delay.
pub fn refresh_delay(token: &str, now: DateTime<Utc>, session: &SessionConfig) -> Duration {
    let delay = match token_expiry(token) {
        Some(expires_at) => {
            let margin = chrono::Duration::seconds(session.refresh_margin_secs as i64);
            (expires_at - margin - now).to_std().unwrap_or(Duration::ZERO)
        }
        None => session.refresh_fallback(),
    };
    delay.max(session.refresh_min_delay())
}
