//! Rate providers for fetching exchange rates
//!
//! - FixedRateProvider: static table, for tests and pinned deployments
//! - OpenErApiProvider: the open.er-api.com "latest" endpoint

use super::exchange_rate::{ExchangeRateError, ExchangeRateResult, RateProvider, RateSnapshot};
use crate::services::currency;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const OPEN_ER_API_URL: &str = "https://open.er-api.com/v6/latest/{base}";

/// Rate provider backed by a fixed table
#[derive(Debug, Clone)]
pub struct FixedRateProvider {
    base_code: String,
    rates: HashMap<String, Decimal>,
}

impl FixedRateProvider {
    pub fn new(base_code: &str) -> Self {
        Self {
            base_code: currency::normalize_code(base_code),
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, code: &str, rate: Decimal) -> Self {
        self.rates.insert(currency::normalize_code(code), rate);
        self
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn fetch_rates(&self, base: &str) -> ExchangeRateResult<RateSnapshot> {
        let snapshot = RateSnapshot {
            base_code: self.base_code.clone(),
            rates: self.rates.clone(),
            source: self.name().to_string(),
            fetched_at: chrono::Utc::now(),
        };
        if snapshot.rates.is_empty() {
            return Ok(snapshot);
        }
        snapshot.rebase(base)
    }

    fn name(&self) -> &str {
        "FixedRateProvider"
    }
}

/// Response body of `GET /v6/latest/{base}`
#[derive(Debug, Deserialize)]
struct OpenErApiResponse {
    result: String,
    #[serde(default)]
    base_code: String,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

/// Rates from open.er-api.com
pub struct OpenErApiProvider {
    http_client: Client,
    api_url: String,
}

impl OpenErApiProvider {
    /// `api_url` may contain a `{base}` placeholder; otherwise the base code is appended.
    pub fn new(api_url: &str, timeout: Duration) -> ExchangeRateResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeRateError::ProviderError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: api_url.to_string(),
        })
    }

    fn url_for(&self, base: &str) -> String {
        let base = currency::normalize_code(base);
        if self.api_url.contains("{base}") {
            self.api_url.replace("{base}", &base)
        } else {
            format!("{}/{}", self.api_url.trim_end_matches('/'), base)
        }
    }

    fn parse_response(&self, body: &str) -> ExchangeRateResult<RateSnapshot> {
        let response: OpenErApiResponse = serde_json::from_str(body).map_err(|e| {
            ExchangeRateError::ProviderError(format!("Invalid rate response: {}", e))
        })?;

        if response.result != "success" {
            return Err(ExchangeRateError::ProviderError(format!(
                "open.er-api returned {}: {}",
                response.result,
                response.error_type.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let mut snapshot = RateSnapshot::new(&response.base_code, self.name());
        for (code, rate) in response.rates {
            match Decimal::from_f64(rate) {
                Some(rate) => {
                    snapshot.rates.insert(code, rate);
                }
                None => warn!(currency = %code, rate, "Skipping unrepresentable rate"),
            }
        }
        snapshot.rates.remove(&snapshot.base_code);
        Ok(snapshot)
    }
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
    async fn fetch_rates(&self, base: &str) -> ExchangeRateResult<RateSnapshot> {
        let url = self.url_for(base);
        debug!(url = %url, "Fetching exchange rates");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeRateError::ProviderError(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ExchangeRateError::ProviderError(format!("HTTP error: {}", e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| ExchangeRateError::ProviderError(format!("Read failed: {}", e)))?;

        self.parse_response(&body)
    }

    fn name(&self) -> &str {
        "OpenErApiProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fixed_rate_provider() {
        let provider = FixedRateProvider::new("cny").with_rate("usd", dec!(0.138));
        let snapshot = provider.fetch_rates("CNY").await.unwrap();

        assert_eq!(snapshot.base_code, "CNY");
        assert_eq!(snapshot.rates.get("USD"), Some(&dec!(0.138)));
        assert_eq!(snapshot.source, "FixedRateProvider");
    }

    #[tokio::test]
    async fn test_fixed_rate_provider_rebases() {
        let provider = FixedRateProvider::new("USD").with_rate("CNY", dec!(8));
        let snapshot = provider.fetch_rates("CNY").await.unwrap();

        assert_eq!(snapshot.base_code, "CNY");
        assert_eq!(snapshot.rates.get("USD"), Some(&dec!(0.125)));
    }

    #[test]
    fn test_url_template() {
        let provider = OpenErApiProvider::new(OPEN_ER_API_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.url_for("cny"), "https://open.er-api.com/v6/latest/CNY");

        let provider =
            OpenErApiProvider::new("http://localhost:8080/latest/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.url_for("USD"), "http://localhost:8080/latest/USD");
    }

    #[test]
    fn test_parse_success_response() {
        let provider = OpenErApiProvider::new(OPEN_ER_API_URL, Duration::from_secs(5)).unwrap();
        let body = r#"{
            "result": "success",
            "base_code": "CNY",
            "time_last_update_unix": 1700000000,
            "rates": { "CNY": 1, "USD": 0.138, "JPY": 20.5 }
        }"#;

        let snapshot = provider.parse_response(body).unwrap();
        assert_eq!(snapshot.base_code, "CNY");
        assert_eq!(snapshot.rates.len(), 2);
        assert_eq!(snapshot.cross_rate("CNY", "USD").unwrap(), dec!(0.138));
    }

    #[test]
    fn test_parse_error_response() {
        let provider = OpenErApiProvider::new(OPEN_ER_API_URL, Duration::from_secs(5)).unwrap();
        let body = r#"{ "result": "error", "error-type": "unsupported-code" }"#;

        match provider.parse_response(body) {
            Err(ExchangeRateError::ProviderError(message)) => {
                assert!(message.contains("unsupported-code"))
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }
}
