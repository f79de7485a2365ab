use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub list: ListConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth provider for session access tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub session_cookie: String,
    /// Auth provider base URL (token exchange)
    pub provider_url: String,
    #[serde(skip_serializing)]
    pub provider_api_key: String,
    pub sign_in_route: String,
    pub onboarding_route: String,
    pub home_route: String,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_ms: u64,
    pub human_limit: u32,
    pub agent_limit: u32,
    /// Entries idle for this many whole windows are evicted
    pub retention_windows: u64,
    /// Lazy sweep runs once every this many checks
    pub sweep_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    /// Upper bound on rows fetched for in-memory filtering (agent path)
    pub agent_fetch_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub bucket: String,
    #[serde(skip_serializing)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub default_model: String,
    pub timeout_secs: u64,
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
        // Server overrides
        if let Ok(v) = env::var("BIND_ADDRESS") {
            self.server.bind = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("AUTH_SESSION_COOKIE") {
            self.auth.session_cookie = v;
        }
        if let Ok(v) = env::var("AUTH_URL") {
            self.auth.provider_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("AUTH_API_KEY") {
            self.auth.provider_api_key = v;
        }
        if let Ok(v) = env::var("AUTH_SECURE_COOKIES") {
            self.auth.secure_cookies = v.parse().unwrap_or(self.auth.secure_cookies);
        }

        // Rate limit overrides
        if let Ok(v) = env::var("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = v.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(v) = env::var("RATE_LIMIT_WINDOW_MS") {
            self.rate_limit.window_ms = v.parse().unwrap_or(self.rate_limit.window_ms);
        }
        if let Ok(v) = env::var("RATE_LIMIT_HUMAN") {
            self.rate_limit.human_limit = v.parse().unwrap_or(self.rate_limit.human_limit);
        }
        if let Ok(v) = env::var("RATE_LIMIT_AGENT") {
            self.rate_limit.agent_limit = v.parse().unwrap_or(self.rate_limit.agent_limit);
        }
        if let Ok(v) = env::var("RATE_LIMIT_RETENTION_WINDOWS") {
            self.rate_limit.retention_windows = v.parse().unwrap_or(self.rate_limit.retention_windows);
        }

        // List overrides
        if let Ok(v) = env::var("LIST_AGENT_FETCH_CAP") {
            self.list.agent_fetch_cap = v.parse().unwrap_or(self.list.agent_fetch_cap);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_URL") {
            self.storage.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("STORAGE_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = env::var("STORAGE_API_KEY") {
            self.storage.api_key = v;
        }

        // LLM gateway overrides
        if let Ok(v) = env::var("LLM_GATEWAY_URL") {
            self.llm.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("LLM_GATEWAY_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = env::var("LLM_DEFAULT_MODEL") {
            self.llm.default_model = v;
        }
        if let Ok(v) = env::var("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = v.parse().unwrap_or(self.llm.timeout_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 3000,
            },
            auth: AuthConfig::defaults(false),
            rate_limit: RateLimitConfig {
                enabled: true,
                ..RateLimitConfig::default()
            },
            list: ListConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 5,
                connection_timeout: 30,
            },
            storage: StorageConfig::defaults(),
            llm: LlmConfig {
                timeout_secs: 120,
                ..LlmConfig::defaults()
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            auth: AuthConfig::defaults(true),
            rate_limit: RateLimitConfig::default(),
            list: ListConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            storage: StorageConfig::defaults(),
            llm: LlmConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            auth: AuthConfig::defaults(true),
            rate_limit: RateLimitConfig::default(),
            list: ListConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            storage: StorageConfig::defaults(),
            llm: LlmConfig {
                timeout_secs: 30,
                ..LlmConfig::defaults()
            },
        }
    }
}

impl AuthConfig {
    fn defaults(secure_cookies: bool) -> Self {
        Self {
            jwt_secret: String::new(),
            session_cookie: "sb-access-token".to_string(),
            provider_url: "http://localhost:54321/auth/v1".to_string(),
            provider_api_key: String::new(),
            sign_in_route: "/login".to_string(),
            onboarding_route: "/onboarding".to_string(),
            home_route: "/app".to_string(),
            secure_cookies,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            human_limit: 60,
            agent_limit: 300,
            retention_windows: 5,
            sweep_interval: 1024,
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 200,
            agent_fetch_cap: 1000,
        }
    }
}

impl StorageConfig {
    fn defaults() -> Self {
        Self {
            base_url: "http://localhost:54321/storage/v1".to_string(),
            bucket: "uploads".to_string(),
            api_key: String::new(),
        }
    }
}

impl LlmConfig {
    fn defaults() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            default_model: "openai/gpt-4o-mini".to_string(),
            timeout_secs: 60,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.auth.secure_cookies);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.human_limit, 60);
        assert_eq!(config.rate_limit.agent_limit, 300);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.auth.secure_cookies);
        assert_eq!(config.list.default_limit, 50);
        assert_eq!(config.list.max_limit, 200);
        assert_eq!(config.list.agent_fetch_cap, 1000);
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = AppConfig::development();
        config.auth.jwt_secret = "super-secret".to_string();
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("super-secret"));
    }
}
