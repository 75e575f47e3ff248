mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, LogFormat, LoggingConfig, RateLimitSettings, ServerConfig,
    StorageConfig, UsageSettings,
};
