use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub usage: UsageSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Request header carrying the API key secret
    pub header_name: String,
    /// Static recognizable marker prepended to every issued secret
    pub key_marker: String,
    /// Full-access key created at startup; usually set via ADMIN_API_KEY
    pub bootstrap_admin_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Ceiling applied to keys issued without an explicit limit
    pub default_requests_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageSettings {
    pub buffer_size: usize,
    pub batch_size: usize,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "memory" or "postgres" (postgres reads DATABASE_URL)
    pub backend: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_name: "X-API-Key".to_string(),
            key_marker: "ak_live_".to_string(),
            bootstrap_admin_key: None,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default_requests_per_minute: 60,
        }
    }
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            batch_size: 32,
            retry_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.header_name, "X-API-Key");
        assert_eq!(config.auth.key_marker, "ak_live_");
        assert_eq!(config.rate_limit.default_requests_per_minute, 60);
        assert_eq!(config.usage.buffer_size, 1024);
        assert_eq!(config.storage.backend, "memory");
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: AppConfig =
            serde_json::from_str(r#"{"auth": {"header_name": "X-Partner-Key"}}"#).unwrap();

        assert_eq!(config.auth.header_name, "X-Partner-Key");
        // Untouched sections keep their defaults
        assert_eq!(config.auth.key_marker, "ak_live_");
        assert_eq!(config.server.port, 8080);
    }
}
