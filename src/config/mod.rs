use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub tenant: TenantConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_prefix: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Configured app domain, e.g. `example.com`. `None` switches the host
    /// classifier to label-count inference.
    pub app_domain: Option<String>,
    pub default_api_key: String,
    pub locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub refresh_margin_secs: u64,
    pub refresh_fallback_secs: u64,
    pub refresh_min_delay_secs: u64,
    pub storage_dir: Option<PathBuf>,
    /// Where a login without remember-me keeps its token between commands
    pub runtime_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = env::var("API_AUTH_PREFIX") {
            self.api.auth_prefix = v;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }

        // Tenant overrides
        if let Ok(v) = env::var("APP_DOMAIN") {
            let v = v.trim();
            self.tenant.app_domain = if v.is_empty() { None } else { Some(v.to_string()) };
        }
        if let Ok(v) = env::var("DEFAULT_API_KEY") {
            self.tenant.default_api_key = v;
        }
        if let Ok(v) = env::var("APP_LOCALE") {
            self.tenant.locale = v;
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_REFRESH_MARGIN_SECS") {
            self.session.refresh_margin_secs = v.parse().unwrap_or(self.session.refresh_margin_secs);
        }
        if let Ok(v) = env::var("SESSION_REFRESH_FALLBACK_SECS") {
            self.session.refresh_fallback_secs = v.parse().unwrap_or(self.session.refresh_fallback_secs);
        }
        if let Ok(v) = env::var("SESSION_REFRESH_MIN_DELAY_SECS") {
            self.session.refresh_min_delay_secs = v.parse().unwrap_or(self.session.refresh_min_delay_secs);
        }
        if let Ok(v) = env::var("CONSOLE_CONFIG_DIR") {
            self.session.storage_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("CONSOLE_RUNTIME_DIR") {
            self.session.runtime_dir = Some(PathBuf::from(v));
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
                auth_prefix: "/admin/auth".to_string(),
                request_timeout_secs: 30,
            },
            tenant: TenantConfig {
                app_domain: None,
                default_api_key: String::new(),
                locale: "en".to_string(),
            },
            session: SessionConfig {
                refresh_margin_secs: 5 * 60,
                refresh_fallback_secs: 10 * 60,
                refresh_min_delay_secs: 10,
                storage_dir: None,
                runtime_dir: None,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://api.staging.example.com/api".to_string(),
                auth_prefix: "/admin/auth".to_string(),
                request_timeout_secs: 15,
            },
            tenant: TenantConfig {
                app_domain: Some("staging.example.com".to_string()),
                default_api_key: String::new(),
                locale: "en".to_string(),
            },
            session: SessionConfig {
                refresh_margin_secs: 5 * 60,
                refresh_fallback_secs: 10 * 60,
                refresh_min_delay_secs: 10,
                storage_dir: None,
                runtime_dir: None,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://api.example.com/api".to_string(),
                auth_prefix: "/admin/auth".to_string(),
                request_timeout_secs: 10,
            },
            tenant: TenantConfig {
                app_domain: Some("example.com".to_string()),
                default_api_key: String::new(),
                locale: "en".to_string(),
            },
            session: SessionConfig {
                refresh_margin_secs: 5 * 60,
                refresh_fallback_secs: 10 * 60,
                refresh_min_delay_secs: 30,
                storage_dir: None,
                runtime_dir: None,
            },
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Joins an endpoint name onto the auth namespace, e.g. `login` -> `/admin/auth/login`.
    pub fn auth_path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.auth_prefix.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }
}

impl SessionConfig {
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn refresh_fallback(&self) -> Duration {
        Duration::from_secs(self.refresh_fallback_secs)
    }

    pub fn refresh_min_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_min_delay_secs)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.tenant.app_domain.is_none());
        assert_eq!(config.session.refresh_margin(), Duration::from_secs(300));
        assert_eq!(config.tenant.locale, "en");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.tenant.app_domain.as_deref(), Some("example.com"));
        assert!(config.session.refresh_min_delay_secs >= 10);
    }

    #[test]
    fn test_auth_path_joins_prefix() {
        let mut api = AppConfig::development().api;
        assert_eq!(api.auth_path("login"), "/admin/auth/login");
        api.auth_prefix = "/admin/auth/".to_string();
        assert_eq!(api.auth_path("/refresh"), "/admin/auth/refresh");
    }
}
