use crate::cache::keys::AmountKey;
use crate::chains::tron::types::TokenSymbol;
use crate::payments::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Alipay,
    Stripe,
    Epay,
    Tron,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Alipay => "alipay",
            ProviderName::Stripe => "stripe",
            ProviderName::Epay => "epay",
            ProviderName::Tron => "tron",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "alipay" => Ok(ProviderName::Alipay),
            "stripe" => Ok(ProviderName::Stripe),
            "epay" => Ok(ProviderName::Epay),
            "tron" | "trc20" => Ok(ProviderName::Tron),
            _ => Err(PaymentError::validation(
                format!("unsupported provider: {}", value),
                "provider",
            )),
        }
    }
}

/// Tron-specific order parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TronOrderParams {
    pub token_symbol: TokenSymbol,
}

/// Provider-specific request payload, tagged by provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum RequestExtra {
    #[default]
    None,
    Tron(TronOrderParams),
}

impl RequestExtra {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestExtra::None => "none",
            RequestExtra::Tron(_) => "tron",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePreCreateRequest {
    /// Registry key of the provider instance that should handle the order.
    pub payment_key: String,
    pub product_subject: String,
    /// Merchant order id; echoed back on fulfilment.
    pub out_trade_no: String,
    /// Order total in the smallest unit of `currency`.
    pub total_amount: i64,
    pub currency: String,
    #[serde(default)]
    pub extra: RequestExtra,
}

impl TradePreCreateRequest {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.out_trade_no.trim().is_empty() {
            return Err(PaymentError::validation(
                "out_trade_no is required",
                "out_trade_no",
            ));
        }
        if self.total_amount < 0 {
            return Err(PaymentError::validation(
                "amount must not be negative",
                "total_amount",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::validation("currency is required", "currency"));
        }
        Ok(())
    }
}

/// What the payer must send for a Tron order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TronQuote {
    /// Exact amount to transfer, two decimals, e.g. `"1.94"`.
    pub total_amount: AmountKey,
    pub token_symbol: TokenSymbol,
    /// The same amount in the token's smallest on-chain unit.
    pub raw_amount: String,
    pub pay_to: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Provider-specific response payload, tagged by provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ResponseExtra {
    #[default]
    None,
    Tron(TronQuote),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePreCreateResponse {
    pub out_trade_no: String,
    /// Where the payer goes or pays to: a checkout URL, a QR payload, or a wallet address.
    pub pay_url: String,
    #[serde(default)]
    pub extra: ResponseExtra,
}

/// An inbound provider callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notification {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Fulfilled { out_trade_no: String },
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TradePreCreateRequest {
        TradePreCreateRequest {
            payment_key: "tron".to_string(),
            product_subject: "Coffee".to_string(),
            out_trade_no: "order-1".to_string(),
            total_amount: 1400,
            currency: "CNY".to_string(),
            extra: RequestExtra::Tron(TronOrderParams {
                token_symbol: TokenSymbol::Usdt,
            }),
        }
    }

    #[test]
    fn request_extra_is_tagged() {
        let json = serde_json::to_value(request()).expect("serialization should succeed");
        assert_eq!(json["extra"]["provider"], "tron");
        assert_eq!(json["extra"]["token_symbol"], "USDT");
    }

    #[test]
    fn request_without_extra_deserializes() {
        let payload = serde_json::json!({
            "payment_key": "stripe",
            "product_subject": "Book",
            "out_trade_no": "order-2",
            "total_amount": 999,
            "currency": "USD"
        });
        let parsed: TradePreCreateRequest =
            serde_json::from_value(payload).expect("deserialization should succeed");
        assert_eq!(parsed.extra, RequestExtra::None);
    }

    #[test]
    fn request_validation() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.out_trade_no = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.total_amount = -1;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn tron_quote_serializes_amount_as_string() {
        let response = TradePreCreateResponse {
            out_trade_no: "order-1".to_string(),
            pay_url: "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".to_string(),
            extra: ResponseExtra::Tron(TronQuote {
                total_amount: AmountKey::from_hundredths(194),
                token_symbol: TokenSymbol::Usdt,
                raw_amount: "1940000".to_string(),
                pay_to: "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".to_string(),
                expires_at: None,
            }),
        };
        let json = serde_json::to_value(&response).expect("serialization should succeed");
        assert_eq!(json["extra"]["total_amount"], "1.94");
        assert_eq!(json["extra"]["token_symbol"], "USDT");
    }

    #[test]
    fn provider_name_parse() {
        assert_eq!("TRON".parse::<ProviderName>().unwrap(), ProviderName::Tron);
        assert!("paypal".parse::<ProviderName>().is_err());
    }
}
