//! Services module for currency handling and exchange rates

pub mod currency;
pub mod exchange_rate;
pub mod rate_providers;

pub use exchange_rate::{
    CurrencyConverter, ExchangeRateError, ExchangeRateResult, ExchangeRateService, RoundingMode,
};
