use std::path::Path;
use std::sync::Arc;

use crate::error::SessionError;
use crate::storage::{FileStorage, MemoryStorage, Storage};

pub const ACCESS_TOKEN_KEY: &str = "admin_access_token";
pub const REMEMBER_ME_KEY: &str = "admin_remember_me";

#[derive(Debug, Clone, Default)]
pub struct Tokens {
    pub access_token: String,
}

/// Bearer token holder over two storage areas.
///
/// Writes go to the area picked by the remember-me flag; reads try that area
/// first and fall back to the other one. Storage failures are logged and read
/// as absence.
pub struct TokenStore {
    durable: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(durable: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        Self { durable, session }
    }

    /// Both areas on disk: durable in the config directory, session-scoped in
    /// the runtime directory, so separate CLI invocations share one login.
    pub fn on_disk(config_dir: Option<&Path>, runtime_dir: Option<&Path>) -> Result<Self, SessionError> {
        let durable = FileStorage::in_config_dir(config_dir)?;
        let session = FileStorage::in_runtime_dir(runtime_dir)?;
        tracing::debug!(
            "Token storage at {} (remembered) and {} (session)",
            durable.path().display(),
            session.path().display()
        );
        Ok(Self::new(Arc::new(durable), Arc::new(session)))
    }

    /// Both areas in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    pub fn set_remember_me(&self, remember: bool) {
        let result = if remember {
            self.durable.set(REMEMBER_ME_KEY, "true")
        } else {
            self.durable.remove(REMEMBER_ME_KEY)
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist remember-me flag: {}", e);
        }
    }

    pub fn get_remember_me(&self) -> bool {
        match self.durable.get(REMEMBER_ME_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::warn!("Failed to read remember-me flag: {}", e);
                false
            }
        }
    }

    pub fn set_tokens(&self, tokens: &Tokens) {
        let (primary, _) = self.slots();
        if let Err(e) = primary.set(ACCESS_TOKEN_KEY, &tokens.access_token) {
            tracing::warn!("Failed to store access token: {}", e);
        }
    }

    pub fn get_access_token(&self) -> Option<String> {
        let (primary, secondary) = self.slots();
        read_token(primary).or_else(|| read_token(secondary))
    }

    pub fn has_token(&self) -> bool {
        self.get_access_token().is_some()
    }

    /// Removes the token from both areas and drops the remember-me flag.
    pub fn clear(&self) {
        for (area, storage) in [("durable", &self.durable), ("session", &self.session)] {
            if let Err(e) = storage.remove(ACCESS_TOKEN_KEY) {
                tracing::warn!("Failed to clear {} access token: {}", area, e);
            }
        }
        if let Err(e) = self.durable.remove(REMEMBER_ME_KEY) {
            tracing::warn!("Failed to clear remember-me flag: {}", e);
        }
    }

    /// (primary, secondary) in read order
    fn slots(&self) -> (&dyn Storage, &dyn Storage) {
        if self.get_remember_me() {
            (self.durable.as_ref(), self.session.as_ref())
        } else {
            (self.session.as_ref(), self.durable.as_ref())
        }
    }
}

fn read_token(storage: &dyn Storage) -> Option<String> {
    match storage.get(ACCESS_TOKEN_KEY) {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            tracing::warn!("Failed to read access token: {}", e);
            None
        }
    }
}
