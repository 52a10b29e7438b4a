use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::host::{classify, TenantKind};
use crate::tenant::{TenantPatch, TenantResolver, TenantState, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapOutcome {
    pub kind: TenantKind,
    pub tenant: TenantState,
}

/// Classifies the host and resolves the tenant, once per load.
///
/// Repeated or concurrent `run` calls all observe the first run's outcome.
pub struct SessionBootstrap {
    app_domain: Option<String>,
    default_api_key: String,
    tenant: Arc<TenantStore>,
    resolver: TenantResolver,
    latch: OnceCell<BootstrapOutcome>,
}

impl SessionBootstrap {
    pub fn new(
        app_domain: Option<String>,
        default_api_key: String,
        tenant: Arc<TenantStore>,
        resolver: TenantResolver,
    ) -> Self {
        Self {
            app_domain,
            default_api_key,
            tenant,
            resolver,
            latch: OnceCell::new(),
        }
    }

    pub async fn run(&self, host: &str) -> BootstrapOutcome {
        self.latch.get_or_init(|| self.bootstrap(host)).await.clone()
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    pub fn outcome(&self) -> Option<&BootstrapOutcome> {
        self.latch.get()
    }

    async fn bootstrap(&self, host: &str) -> BootstrapOutcome {
        let kind = classify(host, self.app_domain.as_deref());
        tracing::info!("Bootstrapping session for host '{}' ({})", host, kind.label());

        match kind.center_slug() {
            None => self.apply_platform_defaults(),
            Some(slug) => {
                self.tenant.begin_resolution();
                match self.resolver.resolve_center(slug).await {
                    Ok(Some(center)) => {
                        tracing::info!("Tenant '{}' resolved", slug);
                        self.tenant.set(center.into_patch(&self.default_api_key));
                    }
                    Ok(None) => {
                        tracing::warn!("No tenant for slug '{}'; using platform defaults", slug);
                        self.apply_platform_defaults();
                    }
                    Err(e) => {
                        tracing::error!("Tenant resolution for '{}' failed: {}; using platform defaults", slug, e);
                        self.apply_platform_defaults();
                    }
                }
            }
        }

        BootstrapOutcome {
            kind,
            tenant: self.tenant.get(),
        }
    }

    fn apply_platform_defaults(&self) {
        self.tenant
            .set(TenantPatch::replace(TenantState::platform(&self.default_api_key)));
    }
}
