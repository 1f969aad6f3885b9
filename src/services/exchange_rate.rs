//! Exchange Rate Service
//!
//! Converts fiat order totals between currencies using a cached snapshot of rates quoted
//! against one base currency. The snapshot is refreshed from a [`RateProvider`] by a
//! [`RateRefreshJob`] that the caller schedules; nothing here is global.

use crate::services::currency;
use crate::workers::scheduler::PeriodicJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exchange rate service error
#[derive(Debug, thiserror::Error)]
pub enum ExchangeRateError {
    #[error("Rate not found for {from} -> {to}")]
    RateNotFound { from: String, to: String },

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Rate provider error: {0}")]
    ProviderError(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Exchange rates are stale: last refreshed {age_secs}s ago")]
    StaleRates { age_secs: u64 },
}

pub type ExchangeRateResult<T> = Result<T, ExchangeRateError>;

/// How a converted amount is rounded to the target currency's precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Nearest value, ties away from zero.
    #[default]
    HalfUp,
    Floor,
    Ceil,
}

impl RoundingMode {
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
            RoundingMode::Ceil => RoundingStrategy::ToPositiveInfinity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::HalfUp => "half_up",
            RoundingMode::Floor => "floor",
            RoundingMode::Ceil => "ceil",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "half_up" | "halfup" | "round" | "default" => Ok(RoundingMode::HalfUp),
            "floor" | "down" => Ok(RoundingMode::Floor),
            "ceil" | "ceiling" | "up" => Ok(RoundingMode::Ceil),
            other => Err(format!("unknown rounding mode: {}", other)),
        }
    }
}

/// Converts a fiat amount into the standard unit of another currency.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// `minor_amount` is expressed in the smallest unit of `from`; the result is in the standard
    /// unit of `to`, rounded to that currency's precision with `rounding`.
    async fn convert_to_standard_unit(
        &self,
        minor_amount: i64,
        from: &str,
        to: &str,
        rounding: RoundingMode,
    ) -> ExchangeRateResult<Decimal>;
}

/// Source of rate snapshots
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch every rate quoted against `base`
    async fn fetch_rates(&self, base: &str) -> ExchangeRateResult<RateSnapshot>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Rates quoted as "units of currency per one unit of `base_code`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base_code: String,
    pub rates: HashMap<String, Decimal>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(base_code: &str, source: &str) -> Self {
        Self {
            base_code: currency::normalize_code(base_code),
            rates: HashMap::new(),
            source: source.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_rate(mut self, code: &str, rate: Decimal) -> Self {
        self.rates.insert(currency::normalize_code(code), rate);
        self
    }

    pub fn fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Rate that turns one unit of `from` into units of `to`.
    pub fn cross_rate(&self, from: &str, to: &str) -> ExchangeRateResult<Decimal> {
        let from = currency::normalize_code(from);
        let to = currency::normalize_code(to);
        if from == to {
            return Ok(Decimal::ONE);
        }

        let from_rate = self.rate_against_base(&from, &to)?;
        let to_rate = self.rate_against_base(&to, &from)?;

        to_rate.checked_div(from_rate).ok_or_else(|| {
            ExchangeRateError::InvalidRate(format!("{} / {} overflows", to_rate, from_rate))
        })
    }

    /// Same rates, quoted against `base` instead.
    pub fn rebase(&self, base: &str) -> ExchangeRateResult<RateSnapshot> {
        let base = currency::normalize_code(base);
        if base == self.base_code {
            return Ok(self.clone());
        }

        let mut rebased = RateSnapshot::new(&base, &self.source).fetched_at(self.fetched_at);
        rebased.rates.insert(self.base_code.clone(), self.cross_rate(&base, &self.base_code)?);
        for code in self.rates.keys().filter(|code| **code != base) {
            rebased.rates.insert(code.clone(), self.cross_rate(&base, code)?);
        }
        Ok(rebased)
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }

    fn rate_against_base(&self, code: &str, counterpart: &str) -> ExchangeRateResult<Decimal> {
        if code == self.base_code {
            return Ok(Decimal::ONE);
        }
        match self.rates.get(code) {
            Some(rate) if *rate > Decimal::ZERO => Ok(*rate),
            Some(rate) => Err(ExchangeRateError::InvalidRate(format!(
                "{} rate must be positive, got {}",
                code, rate
            ))),
            None => Err(ExchangeRateError::RateNotFound {
                from: code.to_string(),
                to: counterpart.to_string(),
            }),
        }
    }
}

/// Exchange rate service configuration
#[derive(Debug, Clone)]
pub struct ExchangeRateServiceConfig {
    pub base_currency: String,
    /// Snapshots older than this are refused. Zero disables the check.
    pub max_age: Duration,
}

impl Default for ExchangeRateServiceConfig {
    fn default() -> Self {
        Self {
            base_currency: "CNY".to_string(),
            max_age: Duration::from_secs(48 * 60 * 60),
        }
    }
}

/// Main exchange rate service
pub struct ExchangeRateService {
    provider: Arc<dyn RateProvider>,
    snapshot: RwLock<Option<RateSnapshot>>,
    config: ExchangeRateServiceConfig,
}

impl ExchangeRateService {
    pub fn new(provider: Arc<dyn RateProvider>, config: ExchangeRateServiceConfig) -> Self {
        Self {
            provider,
            snapshot: RwLock::new(None),
            config,
        }
    }

    /// Seed the service with rates already known, e.g. in tests or on warm restart.
    pub fn with_snapshot(self, snapshot: RateSnapshot) -> Self {
        self.store(snapshot);
        self
    }

    /// Pull a fresh snapshot from the provider. On failure the previous snapshot is kept.
    pub async fn refresh(&self) -> ExchangeRateResult<usize> {
        let snapshot = self.provider.fetch_rates(&self.config.base_currency).await?;
        if snapshot.rates.is_empty() {
            return Err(ExchangeRateError::ProviderError(format!(
                "{} returned no rates for {}",
                self.provider.name(),
                self.config.base_currency
            )));
        }

        let count = snapshot.rates.len();
        info!(
            provider = %self.provider.name(),
            base = %snapshot.base_code,
            rates = count,
            "Exchange rates refreshed"
        );
        self.store(snapshot);
        Ok(count)
    }

    /// Current cross rate between two currencies
    pub fn get_rate(&self, from_currency: &str, to_currency: &str) -> ExchangeRateResult<Decimal> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = guard.as_ref().ok_or_else(|| ExchangeRateError::RateNotFound {
            from: currency::normalize_code(from_currency),
            to: currency::normalize_code(to_currency),
        })?;

        if !self.config.max_age.is_zero() {
            let age = snapshot.age();
            if age > self.config.max_age {
                return Err(ExchangeRateError::StaleRates {
                    age_secs: age.as_secs(),
                });
            }
        }

        snapshot.cross_rate(from_currency, to_currency)
    }

    pub fn snapshot(&self) -> Option<RateSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn store(&self, snapshot: RateSnapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(snapshot);
    }
}

#[async_trait]
impl CurrencyConverter for ExchangeRateService {
    async fn convert_to_standard_unit(
        &self,
        minor_amount: i64,
        from: &str,
        to: &str,
        rounding: RoundingMode,
    ) -> ExchangeRateResult<Decimal> {
        if minor_amount < 0 {
            return Err(ExchangeRateError::InvalidAmount(format!(
                "Amount must not be negative, got {}",
                minor_amount
            )));
        }

        let standard = currency::to_standard_units(minor_amount, from);
        let rate = self.get_rate(from, to)?;
        let converted = standard.checked_mul(rate).ok_or_else(|| {
            ExchangeRateError::InvalidAmount(format!("{} * {} overflows", standard, rate))
        })?;
        let quantized = currency::quantize(converted, to, rounding);

        debug!(
            from = %from,
            to = %to,
            amount = %standard,
            rate = %rate,
            converted = %quantized,
            "Converted amount"
        );

        Ok(quantized)
    }
}

/// Periodically refreshes an [`ExchangeRateService`].
pub struct RateRefreshJob {
    service: Arc<ExchangeRateService>,
}

impl RateRefreshJob {
    pub fn new(service: Arc<ExchangeRateService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PeriodicJob for RateRefreshJob {
    fn name(&self) -> &str {
        "exchange-rate-refresh"
    }

    async fn run_once(&mut self) {
        if let Err(e) = self.service.refresh().await {
            warn!(
                provider = %self.service.provider_name(),
                error = %e,
                "Exchange rate refresh failed; keeping previous snapshot"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_providers::FixedRateProvider;
    use rust_decimal_macros::dec;

    fn cny_snapshot() -> RateSnapshot {
        RateSnapshot::new("CNY", "test")
            .with_rate("USD", dec!(0.138))
            .with_rate("JPY", dec!(20.5))
            .with_rate("EUR", dec!(0.127))
    }

    fn service_with(snapshot: RateSnapshot) -> ExchangeRateService {
        let provider = Arc::new(FixedRateProvider::new("CNY"));
        ExchangeRateService::new(provider, ExchangeRateServiceConfig::default())
            .with_snapshot(snapshot)
    }

    // --- RateSnapshot ---

    #[test]
    fn test_cross_rate_through_base() {
        let snapshot = cny_snapshot();
        assert_eq!(snapshot.cross_rate("CNY", "USD").unwrap(), dec!(0.138));
        assert_eq!(snapshot.cross_rate("usd", "usd").unwrap(), Decimal::ONE);
        let usd_to_jpy = snapshot.cross_rate("USD", "JPY").unwrap();
        assert_eq!(usd_to_jpy.round_dp(4), dec!(148.5507));
    }

    #[test]
    fn test_missing_and_zero_rates_are_errors() {
        let snapshot = cny_snapshot().with_rate("GBP", Decimal::ZERO);
        assert!(matches!(
            snapshot.cross_rate("CNY", "CHF"),
            Err(ExchangeRateError::RateNotFound { .. })
        ));
        assert!(matches!(
            snapshot.cross_rate("GBP", "USD"),
            Err(ExchangeRateError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_rebase_keeps_cross_rates() {
        let rebased = cny_snapshot().rebase("USD").unwrap();
        assert_eq!(rebased.base_code, "USD");
        assert_eq!(rebased.cross_rate("CNY", "USD").unwrap().round_dp(6), dec!(0.138));
        assert!(rebased.rates.contains_key("CNY"));
        assert!(!rebased.rates.contains_key("USD"));
    }

    // --- conversion ---

    #[tokio::test]
    async fn test_convert_cny_to_usd_rounding() {
        let service = service_with(cny_snapshot());

        let half_up = service
            .convert_to_standard_unit(1400, "CNY", "USD", RoundingMode::HalfUp)
            .await
            .unwrap();
        let ceil = service
            .convert_to_standard_unit(1400, "CNY", "USD", RoundingMode::Ceil)
            .await
            .unwrap();
        let floor = service
            .convert_to_standard_unit(1400, "CNY", "USD", RoundingMode::Floor)
            .await
            .unwrap();

        assert_eq!(half_up, dec!(1.93));
        assert_eq!(ceil, dec!(1.94));
        assert_eq!(floor, dec!(1.93));
    }

    #[tokio::test]
    async fn test_convert_into_zero_decimal_currency() {
        let service = service_with(cny_snapshot());
        let yen = service
            .convert_to_standard_unit(10_025, "CNY", "JPY", RoundingMode::HalfUp)
            .await
            .unwrap();
        // 100.25 CNY * 20.5 = 2055.125 JPY
        assert_eq!(yen, dec!(2055));
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let service = service_with(cny_snapshot());
        let result = service
            .convert_to_standard_unit(-1, "CNY", "USD", RoundingMode::HalfUp)
            .await;
        assert!(matches!(result, Err(ExchangeRateError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_stale_snapshot_refused() {
        let old = cny_snapshot().fetched_at(Utc::now() - chrono::Duration::hours(49));
        let service = service_with(old);
        let result = service
            .convert_to_standard_unit(1400, "CNY", "USD", RoundingMode::HalfUp)
            .await;
        assert!(matches!(result, Err(ExchangeRateError::StaleRates { .. })));
    }

    #[tokio::test]
    async fn test_no_snapshot_yet() {
        let provider = Arc::new(FixedRateProvider::new("CNY"));
        let service = ExchangeRateService::new(provider, ExchangeRateServiceConfig::default());
        assert!(matches!(
            service.get_rate("CNY", "USD"),
            Err(ExchangeRateError::RateNotFound { .. })
        ));
    }

    // --- refresh ---

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let provider = Arc::new(FixedRateProvider::new("CNY").with_rate("USD", dec!(0.14)));
        let service = ExchangeRateService::new(provider, ExchangeRateServiceConfig::default())
            .with_snapshot(cny_snapshot());

        assert_eq!(service.refresh().await.unwrap(), 1);
        assert_eq!(service.get_rate("CNY", "USD").unwrap(), dec!(0.14));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        // A provider with no rates is treated as a failed refresh.
        let provider = Arc::new(FixedRateProvider::new("CNY"));
        let service = Arc::new(
            ExchangeRateService::new(provider, ExchangeRateServiceConfig::default())
                .with_snapshot(cny_snapshot()),
        );

        let mut job = RateRefreshJob::new(service.clone());
        job.run_once().await;

        assert_eq!(service.get_rate("CNY", "USD").unwrap(), dec!(0.138));
    }

    #[test]
    fn test_rounding_mode_parse() {
        assert_eq!("HALF_UP".parse::<RoundingMode>().unwrap(), RoundingMode::HalfUp);
        assert_eq!("floor".parse::<RoundingMode>().unwrap(), RoundingMode::Floor);
        assert_eq!("ceiling".parse::<RoundingMode>().unwrap(), RoundingMode::Ceil);
        assert!("banker".parse::<RoundingMode>().is_err());
    }
}
