use crate::cache::keys::AmountKey;
use crate::chains::tron::types::{is_valid_tron_address, TokenSymbol};
use crate::config::ConfigError;
use crate::services::exchange_rate::RoundingMode;
use std::env;
use std::time::Duration;

pub const MAINNET_API_URL: &str = "https://api.trongrid.io";
pub const NILE_API_URL: &str = "https://nile.trongrid.io";

/// Tron provider configuration
#[derive(Debug, Clone)]
pub struct TronConfig {
    /// Receiving account every order is paid into.
    pub address: String,
    /// Trongrid API key. Without one the provider talks to the Nile testnet.
    pub api_key: Option<String>,
    /// Overrides the network-derived Trongrid URL.
    pub api_base_url: Option<String>,
    pub accept_tokens: Vec<TokenSymbol>,
    /// How long an amount stays reserved for an unpaid order.
    pub order_timeout: Duration,
    pub poll_interval: Duration,
    /// Width of the block-timestamp window fetched per poll.
    pub lookback_window: Duration,
    pub request_timeout: Duration,
    pub page_limit: u32,
    pub max_pages: u32,
    /// Fiat currency token amounts are priced in (stablecoins track USD).
    pub quote_currency: String,
    pub rounding: RoundingMode,
    /// Amount used when conversion yields zero or less. `None` rejects such orders.
    pub min_amount: Option<AmountKey>,
    pub max_search_attempts: u32,
    /// How long a fulfilled transaction id is remembered to suppress re-delivery.
    pub seen_tx_ttl: Duration,
    pub seen_tx_capacity: usize,
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            api_key: None,
            api_base_url: None,
            accept_tokens: TokenSymbol::ALL.to_vec(),
            order_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(5),
            lookback_window: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            page_limit: 200,
            max_pages: 5,
            quote_currency: "USD".to_string(),
            rounding: RoundingMode::HalfUp,
            min_amount: Some(AmountKey::SMALLEST),
            max_search_attempts: 100,
            seen_tx_ttl: Duration::from_secs(60),
            seen_tx_capacity: 10_000,
        }
    }
}

impl TronConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lookback_window = Duration::from_secs(
            env::var("TRON_LOOKBACK_WINDOW_SECONDS")
                .unwrap_or_else(|_| defaults.lookback_window.as_secs().to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("TRON_LOOKBACK_WINDOW_SECONDS".to_string())
                })?,
        );

        Ok(TronConfig {
            address: env::var("TRON_RECEIVING_ADDRESS")
                .map_err(|_| ConfigError::MissingVariable("TRON_RECEIVING_ADDRESS".to_string()))?,
            api_key: env::var("TRON_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            api_base_url: env::var("TRON_API_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            accept_tokens: match env::var("TRON_ACCEPT_TOKENS") {
                Ok(tokens) => parse_token_list(&tokens)?,
                Err(_) => defaults.accept_tokens,
            },
            order_timeout: Duration::from_secs(
                env::var("TRON_ORDER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| defaults.order_timeout.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TRON_ORDER_TIMEOUT_SECONDS".to_string())
                    })?,
            ),
            poll_interval: Duration::from_secs(
                env::var("TRON_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| defaults.poll_interval.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TRON_POLL_INTERVAL_SECONDS".to_string())
                    })?,
            ),
            lookback_window,
            request_timeout: Duration::from_secs(
                env::var("TRON_REQUEST_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| defaults.request_timeout.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TRON_REQUEST_TIMEOUT_SECONDS".to_string())
                    })?,
            ),
            page_limit: env::var("TRON_PAGE_LIMIT")
                .unwrap_or_else(|_| defaults.page_limit.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TRON_PAGE_LIMIT".to_string()))?,
            max_pages: env::var("TRON_MAX_PAGES")
                .unwrap_or_else(|_| defaults.max_pages.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TRON_MAX_PAGES".to_string()))?,
            quote_currency: env::var("TRON_QUOTE_CURRENCY")
                .unwrap_or(defaults.quote_currency)
                .trim()
                .to_uppercase(),
            rounding: match env::var("TRON_ROUNDING") {
                Ok(mode) => mode
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("TRON_ROUNDING".to_string()))?,
                Err(_) => defaults.rounding,
            },
            min_amount: match env::var("TRON_MIN_AMOUNT") {
                Ok(amount) => parse_min_amount(&amount)?,
                Err(_) => defaults.min_amount,
            },
            max_search_attempts: env::var("TRON_MAX_SEARCH_ATTEMPTS")
                .unwrap_or_else(|_| defaults.max_search_attempts.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TRON_MAX_SEARCH_ATTEMPTS".to_string()))?,
            seen_tx_ttl: (lookback_window * 2).max(defaults.seen_tx_ttl),
            seen_tx_capacity: defaults.seen_tx_capacity,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_tron_address(&self.address) {
            return Err(ConfigError::InvalidValue(
                "TRON_RECEIVING_ADDRESS must be a base58 Tron address".to_string(),
            ));
        }

        if self.accept_tokens.is_empty() {
            return Err(ConfigError::InvalidValue(
                "TRON_ACCEPT_TOKENS cannot be empty".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TRON_POLL_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        // A window narrower than the poll interval leaves gaps between polls.
        if self.lookback_window < self.poll_interval {
            return Err(ConfigError::ValidationFailed(
                "TRON_LOOKBACK_WINDOW_SECONDS must be >= TRON_POLL_INTERVAL_SECONDS".to_string(),
            ));
        }

        // Evaluated transfers must be remembered for as long as a poll can return them again.
        if self.seen_tx_ttl < self.lookback_window {
            return Err(ConfigError::ValidationFailed(
                "seen transaction ttl must be >= TRON_LOOKBACK_WINDOW_SECONDS".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TRON_REQUEST_TIMEOUT_SECONDS cannot be 0".to_string(),
            ));
        }

        if self.page_limit == 0 || self.max_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "TRON_PAGE_LIMIT and TRON_MAX_PAGES must be positive".to_string(),
            ));
        }

        if self.max_search_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "TRON_MAX_SEARCH_ATTEMPTS cannot be 0".to_string(),
            ));
        }

        if self.quote_currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "TRON_QUOTE_CURRENCY cannot be empty".to_string(),
            ));
        }

        if let Some(url) = &self.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "TRON_API_BASE_URL must be a valid URL".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        match (&self.api_base_url, &self.api_key) {
            (Some(url), _) => url,
            (None, Some(_)) => MAINNET_API_URL,
            (None, None) => NILE_API_URL,
        }
    }

    pub fn network_name(&self) -> &'static str {
        if self.api_key.is_some() {
            "mainnet"
        } else {
            "nile"
        }
    }
}

fn parse_token_list(raw: &str) -> Result<Vec<TokenSymbol>, ConfigError> {
    let mut tokens = Vec::new();
    for symbol in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let token: TokenSymbol = symbol
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("TRON_ACCEPT_TOKENS: {}", symbol)))?;
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn parse_min_amount(raw: &str) -> Result<Option<AmountKey>, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "none" | "off" => Ok(None),
        amount => {
            let key: AmountKey = amount
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TRON_MIN_AMOUNT".to_string()))?;
            if key.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "TRON_MIN_AMOUNT must be positive".to_string(),
                ));
            }
            Ok(Some(key))
        }
    }
}
