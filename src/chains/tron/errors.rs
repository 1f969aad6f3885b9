use crate::services::exchange_rate::ExchangeRateError;
use thiserror::Error;

pub type TronResult<T> = Result<T, TronError>;

#[derive(Debug, Error)]
pub enum TronError {
    #[error("Unsupported token: {token}")]
    UnsupportedToken { token: String },

    #[error("Currency conversion failed: {message}")]
    ConversionFailure { message: String },

    #[error("No free amount found within {attempts} cent(s) above {base}")]
    AllocationExhausted { base: String, attempts: u32 },

    #[error("Transfer poll failed: {message}")]
    PollFetchFailure { message: String },

    #[error("Transfer {transaction_id} could not be parsed: {message}")]
    RecordParseFailure {
        transaction_id: String,
        message: String,
    },

    #[error("Timeout error: request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl TronError {
    pub fn unsupported_token(token: impl Into<String>) -> Self {
        Self::UnsupportedToken {
            token: token.into(),
        }
    }

    pub fn conversion_failure(message: impl Into<String>) -> Self {
        Self::ConversionFailure {
            message: message.into(),
        }
    }

    pub fn allocation_exhausted(base: impl Into<String>, attempts: u32) -> Self {
        Self::AllocationExhausted {
            base: base.into(),
            attempts,
        }
    }

    pub fn poll_fetch_failure(message: impl Into<String>) -> Self {
        Self::PollFetchFailure {
            message: message.into(),
        }
    }

    pub fn record_parse_failure(
        transaction_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RecordParseFailure {
            transaction_id: transaction_id.into(),
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TronError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TronError::timeout(0)
        } else {
            TronError::poll_fetch_failure(format!("Request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for TronError {
    fn from(err: serde_json::Error) -> Self {
        TronError::poll_fetch_failure(format!("JSON error: {}", err))
    }
}

impl From<ExchangeRateError> for TronError {
    fn from(err: ExchangeRateError) -> Self {
        TronError::conversion_failure(err.to_string())
    }
}
