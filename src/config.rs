use figment::providers::Env;
use rocket::figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub identity: IdentityConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub slow_request_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// External identity service. Tokens it issues are validated offline with the
/// shared `jwt_secret`; sign-up calls go through its HTTP API.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub service_key: String,
    pub request_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
}

pub const DEFAULT_API_BASE_PATH: &str = "/api/v1";

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/penny_pet".to_string(),
            max_connections: 16,
            min_connections: 4,
            acquire_timeout: 5,
            run_migrations: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            slow_request_ms: 500,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9999".to_string(),
            jwt_secret: String::new(),
            jwt_audience: "authenticated".to_string(),
            service_key: String::new(),
            request_timeout: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. defaults
    /// 2. PennyPet.toml
    /// 3. environment variables prefixed with PENNYPET_ (e.g. PENNYPET_DATABASE__URL)
    /// 4. DATABASE_URL, which wins when set
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let mut config: Config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()))
            .merge(Toml::file("PennyPet.toml"))
            .merge(Env::prefixed("PENNYPET_").split("__"))
            .extract()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.api.base_path, "/api/v1");
        assert!(config.database.max_connections >= config.database.min_connections);
        assert_eq!(config.identity.jwt_audience, "authenticated");
    }
}
