//! Application configuration
//! Loads settings from the environment (and `.env` when present) and validates them.

use crate::chains::tron::config::TronConfig;
use crate::services::exchange_rate::ExchangeRateServiceConfig;
use crate::services::rate_providers::OPEN_ER_API_URL;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub tron: TronConfig,
    pub exchange_rate: ExchangeRateConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Exchange-rate feed configuration
#[derive(Debug, Clone)]
pub struct ExchangeRateConfig {
    /// Endpoint template; `{base}` is replaced with the base currency.
    pub api_url: String,
    pub base_currency: String,
    pub refresh_interval: Duration,
    /// Snapshots older than this are refused. Zero disables the check.
    pub max_age: Duration,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            logging: LoggingConfig::from_env()?,
            tron: TronConfig::from_env()?,
            exchange_rate: ExchangeRateConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.tron.validate()?;
        self.exchange_rate.validate()?;

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                "plain" | "text" => LogFormat::Plain,
                _ => return Err(ConfigError::InvalidValue("LOG_FORMAT".to_string())),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl Default for ExchangeRateConfig {
    fn default() -> Self {
        Self {
            api_url: OPEN_ER_API_URL.to_string(),
            base_currency: "CNY".to_string(),
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            max_age: Duration::from_secs(48 * 60 * 60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ExchangeRateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(ExchangeRateConfig {
            api_url: env::var("EXCHANGE_RATE_API_URL").unwrap_or(defaults.api_url),
            base_currency: env::var("EXCHANGE_RATE_BASE_CURRENCY")
                .unwrap_or(defaults.base_currency)
                .trim()
                .to_uppercase(),
            refresh_interval: Duration::from_secs(
                env::var("EXCHANGE_RATE_REFRESH_SECONDS")
                    .unwrap_or_else(|_| defaults.refresh_interval.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("EXCHANGE_RATE_REFRESH_SECONDS".to_string())
                    })?,
            ),
            max_age: Duration::from_secs(
                env::var("EXCHANGE_RATE_MAX_AGE_SECONDS")
                    .unwrap_or_else(|_| defaults.max_age.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("EXCHANGE_RATE_MAX_AGE_SECONDS".to_string())
                    })?,
            ),
            request_timeout: defaults.request_timeout,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "EXCHANGE_RATE_API_URL must be a valid URL".to_string(),
            ));
        }

        if self.base_currency.len() != 3 {
            return Err(ConfigError::InvalidValue(
                "EXCHANGE_RATE_BASE_CURRENCY".to_string(),
            ));
        }

        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "EXCHANGE_RATE_REFRESH_SECONDS".to_string(),
            ));
        }

        if !self.max_age.is_zero() && self.max_age < self.refresh_interval {
            return Err(ConfigError::ValidationFailed(
                "EXCHANGE_RATE_MAX_AGE_SECONDS must not be shorter than the refresh interval"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn service_config(&self) -> ExchangeRateServiceConfig {
        ExchangeRateServiceConfig {
            base_currency: self.base_currency.clone(),
            max_age: self.max_age,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
