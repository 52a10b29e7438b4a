use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::SessionError;
use crate::http::{ApiRequest, AuthenticatedClient};
use crate::session::{RefreshScheduler, TokenStore, Tokens};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    #[serde(default)]
    pub id: Value,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    user: AdminUser,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: ProfileData,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: AdminUser,
}

/// Session transitions for the admin console: login, profile, logout, refresh
pub struct AdminAuthService {
    client: AuthenticatedClient,
    tokens: Arc<TokenStore>,
    refresh: Arc<RefreshScheduler>,
    api: ApiConfig,
}

impl AdminAuthService {
    pub fn new(
        client: AuthenticatedClient,
        tokens: Arc<TokenStore>,
        refresh: Arc<RefreshScheduler>,
        api: ApiConfig,
    ) -> Self {
        Self {
            client,
            tokens,
            refresh,
            api,
        }
    }

    /// Authenticate and install the token under the chosen durability.
    pub async fn login_admin(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<AdminUser, SessionError> {
        let request = ApiRequest::post(self.api.auth_path("login"))
            .skip_auth()
            .json(&json!({ "email": email, "password": password, "remember": remember }))?;

        let envelope: LoginEnvelope = self.client.send_json(request).await?;
        if envelope.data.token.is_empty() {
            return Err(SessionError::invalid_response("login response carried an empty token"));
        }

        // A previous login may have left a token in the other storage area
        self.refresh.end_session();
        self.tokens.set_remember_me(remember);
        self.tokens.set_tokens(&Tokens {
            access_token: envelope.data.token,
        });
        self.refresh.schedule_token_refresh();

        tracing::info!("Admin '{}' logged in (remember: {})", email, remember);
        Ok(envelope.data.user)
    }

    /// Current admin, or `None` without a network call when logged out.
    pub async fn fetch_admin_profile(&self) -> Result<Option<AdminUser>, SessionError> {
        if !self.tokens.has_token() {
            return Ok(None);
        }

        let envelope: ProfileEnvelope = self
            .client
            .send_json(ApiRequest::get(self.api.auth_path("me")))
            .await?;
        Ok(Some(envelope.data.user))
    }

    /// Server-side logout is best effort; local state is always cleared.
    pub async fn logout_admin(&self) {
        if self.tokens.has_token() {
            let request = ApiRequest::post(self.api.auth_path("logout"));
            if let Err(e) = self.client.send(request).await {
                tracing::warn!("Server logout failed: {}", e);
            }
        }

        self.refresh.end_session();
        tracing::info!("Admin session cleared");
    }

    /// Renew the token now. Failure ends the session.
    pub async fn refresh_admin_session(&self) -> Result<String, SessionError> {
        match self.refresh.refresh_token().await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.refresh.end_session();
                Err(e)
            }
        }
    }
}
