//! Layered application configuration

mod app_config;

pub use app_config::{
    ApiKeysConfig, AppConfig, Environment, LogFormat, LoggingConfig, OAuthConfig,
    RateLimitPresets, SecurityConfig, ServerConfig, DEVELOPMENT_PEPPER,
};
