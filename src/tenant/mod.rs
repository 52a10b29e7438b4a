pub mod resolver;
pub mod state;

pub use resolver::{normalize_center_response, ResolvedCenter, TenantResolver};
pub use state::{
    get_tenant_state, set_tenant_state, subscribe_tenant, Branding, CenterId, Subscription, TenantPatch,
    TenantState, TenantStore,
};
