use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::config;

/// Center identifiers arrive as numbers from most endpoints, strings from some
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CenterId {
    Number(i64),
    Text(String),
}

impl fmt::Display for CenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CenterId::Number(id) => write!(f, "{}", id),
            CenterId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for CenterId {
    fn from(id: i64) -> Self {
        CenterId::Number(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Branding {
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
}

/// Resolved tenant identity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TenantState {
    pub api_key: String,
    pub center_id: Option<CenterId>,
    pub center_slug: Option<String>,
    pub center_name: Option<String>,
    pub branding: Option<Branding>,
    pub is_resolved: bool,
}

impl TenantState {
    /// Platform defaults: default key, no center, resolved
    pub fn platform(default_api_key: &str) -> Self {
        Self {
            api_key: default_api_key.to_string(),
            is_resolved: true,
            ..Self::default()
        }
    }
}

/// Partial update. Outer `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub api_key: Option<String>,
    pub center_id: Option<Option<CenterId>>,
    pub center_slug: Option<Option<String>>,
    pub center_name: Option<Option<String>>,
    pub branding: Option<Option<Branding>>,
    pub is_resolved: Option<bool>,
}

impl TenantPatch {
    /// Replace every field with `state`
    pub fn replace(state: TenantState) -> Self {
        Self {
            api_key: Some(state.api_key),
            center_id: Some(state.center_id),
            center_slug: Some(state.center_slug),
            center_name: Some(state.center_name),
            branding: Some(state.branding),
            is_resolved: Some(state.is_resolved),
        }
    }
}

type Listener = Arc<dyn Fn(&TenantState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Observable tenant store. Framework agnostic: listeners are plain closures.
pub struct TenantStore {
    state: RwLock<TenantState>,
    listeners: Arc<Mutex<Listeners>>,
}

impl TenantStore {
    pub fn new(initial: TenantState) -> Self {
        Self {
            state: RwLock::new(initial),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Unresolved store carrying the platform default key
    pub fn with_default_key(default_api_key: &str) -> Self {
        Self::new(TenantState {
            api_key: default_api_key.to_string(),
            ..TenantState::default()
        })
    }

    pub fn get(&self) -> TenantState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).is_resolved
    }

    /// Shallow-merge `patch` and notify subscribers.
    ///
    /// `is_resolved` never goes from `true` back to `false` here; use
    /// [`TenantStore::begin_resolution`] for that.
    pub fn set(&self, patch: TenantPatch) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            apply(&mut state, patch);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Explicit re-resolution: the only way `is_resolved` returns to `false`
    pub fn begin_resolution(&self) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.is_resolved = false;
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Drop the selected center, keeping resolution status
    pub fn clear_center(&self, default_api_key: &str) {
        self.set(TenantPatch {
            api_key: Some(default_api_key.to_string()),
            center_id: Some(None),
            center_slug: Some(None),
            center_name: Some(None),
            branding: Some(None),
            is_resolved: None,
        });
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TenantState) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    fn notify(&self, snapshot: &TenantState) {
        // Call outside the lock so listeners may (un)subscribe
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(snapshot);
        }
    }
}

fn apply(state: &mut TenantState, patch: TenantPatch) {
    if let Some(api_key) = patch.api_key {
        state.api_key = api_key;
    }
    if let Some(center_id) = patch.center_id {
        state.center_id = center_id;
    }
    if let Some(center_slug) = patch.center_slug {
        state.center_slug = center_slug;
    }
    if let Some(center_name) = patch.center_name {
        state.center_name = center_name;
    }
    if let Some(branding) = patch.branding {
        state.branding = branding;
    }
    match patch.is_resolved {
        Some(false) if state.is_resolved => {
            tracing::warn!("Ignoring is_resolved regression; use begin_resolution()");
        }
        Some(resolved) => state.is_resolved = resolved,
        None => {}
    }
}

/// Handle returned by [`TenantStore::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

static TENANT: Lazy<Arc<TenantStore>> =
    Lazy::new(|| Arc::new(TenantStore::with_default_key(&config::config().tenant.default_api_key)));

/// Process-wide tenant store
pub fn global() -> Arc<TenantStore> {
    Arc::clone(&TENANT)
}

pub fn get_tenant_state() -> TenantState {
    TENANT.get()
}

pub fn set_tenant_state(patch: TenantPatch) {
    TENANT.set(patch)
}

pub fn subscribe_tenant<F>(listener: F) -> Subscription
where
    F: Fn(&TenantState) + Send + Sync + 'static,
{
    TENANT.subscribe(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolved_center() -> TenantState {
        TenantState {
            api_key: "tenant-key".into(),
            center_id: Some(CenterId::Number(225)),
            center_slug: Some("center-01".into()),
            center_name: Some("Center".into()),
            branding: None,
            is_resolved: true,
        }
    }

    #[test]
    fn test_partial_update_merges() {
        let store = TenantStore::with_default_key("default");
        store.set(TenantPatch {
            center_slug: Some(Some("acme".into())),
            ..TenantPatch::default()
        });

        let state = store.get();
        assert_eq!(state.api_key, "default");
        assert_eq!(state.center_slug.as_deref(), Some("acme"));
        assert!(!state.is_resolved);
    }

    #[test]
    fn test_is_resolved_does_not_regress_through_set() {
        let store = TenantStore::new(resolved_center());
        store.set(TenantPatch {
            is_resolved: Some(false),
            center_name: Some(Some("Renamed".into())),
            ..TenantPatch::default()
        });
        let state = store.get();
        assert!(state.is_resolved);
        assert_eq!(state.center_name.as_deref(), Some("Renamed"));

        store.begin_resolution();
        assert!(!store.is_resolved());
    }

    #[test]
    fn test_subscribers_see_every_update_until_dropped() {
        let store = TenantStore::with_default_key("k");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let subscription = store.subscribe(move |state| {
            assert_eq!(state.api_key, "k");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set(TenantPatch::default());
        store.begin_resolution();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        store.set(TenantPatch::default());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_process_wide_store_notifies_until_unsubscribed() {
        assert!(Arc::ptr_eq(&global(), &global()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = subscribe_tenant(move |state| {
            sink.lock().unwrap().push(state.center_slug.clone());
        });

        set_tenant_state(TenantPatch {
            center_slug: Some(Some("global-acme".into())),
            ..TenantPatch::default()
        });
        assert_eq!(get_tenant_state().center_slug.as_deref(), Some("global-acme"));
        assert_eq!(global().get(), get_tenant_state());
        assert_eq!(*seen.lock().unwrap(), vec![Some("global-acme".to_string())]);

        drop(subscription);
        set_tenant_state(TenantPatch {
            center_slug: Some(None),
            ..TenantPatch::default()
        });
        assert_eq!(get_tenant_state().center_slug, None);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_center_keeps_resolution() {
        let store = TenantStore::new(resolved_center());
        store.clear_center("platform-key");
        let state = store.get();
        assert_eq!(state, TenantState::platform("platform-key"));
    }

    #[test]
    fn test_replace_patch_overwrites_all_fields() {
        let store = TenantStore::new(resolved_center());
        store.set(TenantPatch::replace(TenantState::platform("p")));
        assert_eq!(store.get(), TenantState::platform("p"));
    }
}
