//! Authenticated request pipeline
//!
//! Per request:  Sent -> 2xx | non-401 error                  => done
//!               Sent -> 401 -> refresh -> retried once        => done
//!               Sent -> 401 -> refresh failed -> cleared      => failed

use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{ApiRequest, ApiResponse, Transport, API_KEY_HEADER, LOCALE_HEADER};
use crate::error::SessionError;
use crate::session::{RefreshScheduler, TokenStore};
use crate::tenant::{TenantState, TenantStore};

/// Tenant key and locale, attached to every outgoing call
pub fn apply_session_headers(request: &mut ApiRequest, tenant: &TenantState, locale: &str) {
    if !tenant.api_key.is_empty() {
        request.set_header(API_KEY_HEADER, &tenant.api_key);
    }
    if !locale.is_empty() {
        request.set_header(LOCALE_HEADER, locale);
    }
}

/// Shared authenticated call surface for feature code
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    tenant: Arc<TenantStore>,
    refresh: Arc<RefreshScheduler>,
    locale: Arc<str>,
}

impl AuthenticatedClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        tenant: Arc<TenantStore>,
        refresh: Arc<RefreshScheduler>,
        locale: &str,
    ) -> Self {
        Self {
            transport,
            tokens,
            tenant,
            refresh,
            locale: Arc::from(locale),
        }
    }

    /// Send `request`, recovering from one expired token.
    ///
    /// Does not wait for tenant resolution; callers that need a resolved
    /// tenant check `TenantState::is_resolved` themselves.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, SessionError> {
        self.prepare(&mut request);
        let sent_with = request.bearer().map(str::to_owned);

        let error = match self.dispatch(&request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !error.is_unauthorized() || request.retried || request.skip_auth {
            return Err(error);
        }

        // A refresh may have landed while this request was in flight
        let renewed = match self.tokens.get_access_token() {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                tracing::debug!("{} {} returned 401 with a superseded token; retrying", request.method, request.path);
                Ok(current)
            }
            _ => {
                tracing::debug!("{} {} returned 401; refreshing token", request.method, request.path);
                self.refresh.refresh_token().await
            }
        };

        match renewed {
            Ok(token) => {
                request.retried = true;
                request.set_bearer(&token);
                self.dispatch(&request).await
            }
            Err(refresh_error) => {
                tracing::warn!("Token refresh failed, clearing session: {}", refresh_error);
                self.tokens.clear();
                self.refresh.cancel_token_refresh();
                Err(refresh_error)
            }
        }
    }

    /// `send` and decode the JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, SessionError> {
        self.send(request).await?.json()
    }

    fn prepare(&self, request: &mut ApiRequest) {
        apply_session_headers(request, &self.tenant.get(), &self.locale);

        if request.skip_auth {
            return;
        }
        match self.tokens.get_access_token() {
            Some(token) => request.set_bearer(&token),
            None => tracing::debug!("No access token for {} {}", request.method, request.path),
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, SessionError> {
        self.transport.execute(request).await?.error_for_status()
    }
}
