pub mod bootstrap;
pub mod refresh;
pub mod token_store;

use std::sync::Arc;

pub use bootstrap::{BootstrapOutcome, SessionBootstrap};
pub use refresh::RefreshScheduler;
pub use token_store::{TokenStore, Tokens};

use crate::config::{self, AppConfig};
use crate::error::SessionError;
use crate::http::{AuthenticatedClient, HttpTransport, Transport};
use crate::services::AdminAuthService;
use crate::tenant::{self, TenantResolver, TenantStore};

/// Wires the token store, tenant state, refresh scheduler, request pipeline
/// and bootstrap around one transport.
pub struct Session {
    config: Arc<AppConfig>,
    tokens: Arc<TokenStore>,
    tenant: Arc<TenantStore>,
    refresh: Arc<RefreshScheduler>,
    client: AuthenticatedClient,
    bootstrap: SessionBootstrap,
}

impl Session {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        tokens: TokenStore,
        tenant: Arc<TenantStore>,
    ) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(tokens);

        let refresh = Arc::new(RefreshScheduler::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&tokens),
            Arc::clone(&tenant),
        ));
        let client = AuthenticatedClient::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            Arc::clone(&tenant),
            Arc::clone(&refresh),
            &config.tenant.locale,
        );
        let bootstrap = SessionBootstrap::new(
            config.tenant.app_domain.clone(),
            config.tenant.default_api_key.clone(),
            Arc::clone(&tenant),
            TenantResolver::new(transport, &config.tenant.locale),
        );

        Self {
            config,
            tokens,
            tenant,
            refresh,
            client,
            bootstrap,
        }
    }

    /// Production wiring: reqwest transport, token files in the config and
    /// runtime directories, process-wide tenant state
    pub fn connect() -> Result<Self, SessionError> {
        let config = config::config().clone();
        let transport = Arc::new(HttpTransport::from_config(&config)?);
        let tokens = TokenStore::on_disk(
            config.session.storage_dir.as_deref(),
            config.session.runtime_dir.as_deref(),
        )?;

        Ok(Self::new(config, transport, tokens, tenant::state::global()))
    }

    /// Resolve the tenant for `host` (once per session) and resume renewal
    /// for a token left over from an earlier login.
    pub async fn bootstrap(&self, host: &str) -> BootstrapOutcome {
        let outcome = self.bootstrap.run(host).await;
        if self.tokens.has_token() && !self.refresh.is_armed() {
            self.refresh.schedule_token_refresh();
        }
        outcome
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn tenant(&self) -> &Arc<TenantStore> {
        &self.tenant
    }

    pub fn refresh(&self) -> &Arc<RefreshScheduler> {
        &self.refresh
    }

    pub fn resolver(&self) -> &TenantResolver {
        self.bootstrap.resolver()
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn auth(&self) -> AdminAuthService {
        AdminAuthService::new(
            self.client.clone(),
            Arc::clone(&self.tokens),
            Arc::clone(&self.refresh),
            self.config.api.clone(),
        )
    }
}
