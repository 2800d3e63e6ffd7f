use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::domain::rate_limit::RateLimitConfig;
use crate::domain::DomainError;
use crate::infrastructure::credential::MIN_PBKDF2_ITERATIONS;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::store::StoreConfig;

/// Pepper used when none is configured. Refused in production.
pub const DEVELOPMENT_PEPPER: &str = "credential-guard-development-pepper";

const MIN_PEPPER_LEN: usize = 16;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub store: StoreConfig,
    pub oauth: OAuthConfig,
    pub api_keys: ApiKeysConfig,
    pub rate_limit: RateLimitPresets,
    pub metrics: MetricsConfig,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub environment: Environment,
    #[serde(deserialize_with = "deserialize_secret")]
    pub pepper: SecretString,
    pub bcrypt_cost: u32,
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub state_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiKeysConfig {
    pub cache_ttl_secs: u64,
    pub default_expiry_days: u32,
}

/// Limiter presets: `messaging` for public endpoints, `api` for
/// authenticated traffic
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitPresets {
    pub messaging: RateLimitConfig,
    pub api: RateLimitConfig,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
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

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            pepper: SecretString::from(DEVELOPMENT_PEPPER.to_string()),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl SecurityConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn uses_development_pepper(&self) -> bool {
        self.pepper.expose_secret() == DEVELOPMENT_PEPPER
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: 600,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for ApiKeysConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 1800,
            default_expiry_days: 365,
        }
    }
}

impl Default for RateLimitPresets {
    fn default() -> Self {
        Self {
            messaging: RateLimitConfig::messaging(),
            api: RateLimitConfig::api(),
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

    /// Reject settings that are unsafe for the configured environment
    pub fn validate(&self) -> Result<(), DomainError> {
        let security = &self.security;
        let pepper_len = security.pepper.expose_secret().len();

        if pepper_len < MIN_PEPPER_LEN {
            return Err(DomainError::configuration(format!(
                "security.pepper must be at least {} characters",
                MIN_PEPPER_LEN
            )));
        }

        if security.uses_development_pepper() {
            if security.is_production() {
                return Err(DomainError::configuration(
                    "security.pepper must be set in production",
                ));
            }
            warn!("Using the built-in development pepper; set APP__SECURITY__PEPPER");
        }

        if self.oauth.state_ttl_secs == 0 {
            return Err(DomainError::configuration("oauth.state_ttl_secs must be positive"));
        }

        if self.oauth.sweep_interval_secs == 0 {
            return Err(DomainError::configuration(
                "oauth.sweep_interval_secs must be positive",
            ));
        }

        for (name, preset) in [
            ("messaging", &self.rate_limit.messaging),
            ("api", &self.rate_limit.api),
        ] {
            if preset.user_window_secs == 0 || preset.global_window_secs == 0 {
                return Err(DomainError::configuration(format!(
                    "rate_limit.{} windows must be positive",
                    name
                )));
            }
        }

        Ok(())
    }
}
