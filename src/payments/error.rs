use crate::chains::tron::errors::TronError;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Conversion error: {message}")]
    ConversionError { message: String },

    #[error("Capacity exhausted: {message}")]
    CapacityExhausted { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        PaymentError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::ConversionError { .. } => true,
            PaymentError::CapacityExhausted { .. } => true,
            PaymentError::NetworkError { .. } => true,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::ConversionError { .. } => 503,
            PaymentError::CapacityExhausted { .. } => 503,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::ProviderError { .. } => 502,
        }
    }
}

impl From<TronError> for PaymentError {
    fn from(err: TronError) -> Self {
        match err {
            TronError::UnsupportedToken { token } => PaymentError::ValidationError {
                message: format!("token {} is not accepted", token),
                field: Some("token_symbol".to_string()),
            },
            TronError::ConversionFailure { message } => PaymentError::ConversionError { message },
            e @ TronError::AllocationExhausted { .. } => PaymentError::CapacityExhausted {
                message: e.to_string(),
            },
            e @ (TronError::PollFetchFailure { .. } | TronError::Timeout { .. }) => {
                PaymentError::NetworkError {
                    message: e.to_string(),
                }
            }
            e @ (TronError::RecordParseFailure { .. } | TronError::ConfigError { .. }) => {
                PaymentError::ProviderError {
                    provider: "tron".to_string(),
                    message: e.to_string(),
                    retryable: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(PaymentError::validation("bad", "field").http_status_code(), 400);
        assert_eq!(
            PaymentError::CapacityExhausted {
                message: "full".to_string()
            }
            .http_status_code(),
            503
        );
    }

    #[test]
    fn tron_errors_map_to_payment_errors() {
        let err: PaymentError = TronError::unsupported_token("TRX").into();
        assert!(matches!(err, PaymentError::ValidationError { .. }));
        assert!(!err.is_retryable());

        let err: PaymentError = TronError::allocation_exhausted("1.93", 100).into();
        assert!(matches!(err, PaymentError::CapacityExhausted { .. }));
        assert!(err.is_retryable());

        let err: PaymentError = TronError::conversion_failure("no rate").into();
        assert!(matches!(err, PaymentError::ConversionError { .. }));
    }
}
