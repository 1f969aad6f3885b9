use crate::cache::keys::AmountKey;
use crate::chains::tron::errors::{TronError, TronResult};
use crate::services::exchange_rate::RoundingMode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// TRC20 stablecoins the provider can quote in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenSymbol {
    Usdt,
    Usdc,
}

impl TokenSymbol {
    pub const ALL: [TokenSymbol; 2] = [TokenSymbol::Usdt, TokenSymbol::Usdc];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSymbol::Usdt => "USDT",
            TokenSymbol::Usdc => "USDC",
        }
    }

    /// On-chain decimals of the TRC20 contract.
    pub fn decimals(&self) -> u32 {
        match self {
            TokenSymbol::Usdt | TokenSymbol::Usdc => 6,
        }
    }

    /// Smallest on-chain units for a two-decimal amount.
    pub fn to_raw_units(&self, amount: AmountKey) -> u128 {
        let scale = self.decimals().saturating_sub(AmountKey::DECIMAL_PLACES);
        u128::from(amount.hundredths()) * 10_u128.pow(scale)
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenSymbol {
    type Err = TronError;

    fn from_str(s: &str) -> TronResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "USDT" => Ok(TokenSymbol::Usdt),
            "USDC" => Ok(TokenSymbol::Usdc),
            _ => Err(TronError::unsupported_token(s.trim())),
        }
    }
}

/// Base58 shape check for a mainnet/Nile account address. Does not verify the checksum.
pub fn is_valid_tron_address(address: &str) -> bool {
    address.len() == 34
        && address.starts_with('T')
        && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// Block-timestamp bounds of one poll, in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub min_timestamp_ms: i64,
    pub max_timestamp_ms: i64,
}

impl TimeWindow {
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Self {
        let lookback_ms = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
        let max_timestamp_ms = end.timestamp_millis();
        Self {
            min_timestamp_ms: max_timestamp_ms.saturating_sub(lookback_ms),
            max_timestamp_ms,
        }
    }

    pub fn ending_now(lookback: Duration) -> Self {
        Self::ending_at(Utc::now(), lookback)
    }
}

// ---------------------------------------------------------------------------
// Trongrid wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TrongridResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<TrongridTransfer>,
    #[serde(default)]
    pub meta: Option<TrongridMeta>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrongridMeta {
    pub at: Option<i64>,
    pub page_size: Option<u32>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrongridTokenInfo {
    pub symbol: String,
    #[serde(default)]
    pub address: String,
    pub decimals: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrongridTransfer {
    pub transaction_id: String,
    pub token_info: TrongridTokenInfo,
    pub block_timestamp: i64,
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub transfer_type: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

/// One confirmed incoming TRC20 transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub transaction_id: String,
    pub token_symbol: String,
    pub token_contract: String,
    /// Integer amount in the token's smallest unit, as reported by the explorer.
    pub raw_value: String,
    pub decimals: u32,
    pub from: String,
    pub to: String,
    pub block_timestamp: i64,
}

impl From<TrongridTransfer> for TransferEvent {
    fn from(transfer: TrongridTransfer) -> Self {
        Self {
            transaction_id: transfer.transaction_id,
            token_symbol: transfer.token_info.symbol,
            token_contract: transfer.token_info.address,
            raw_value: transfer.value,
            decimals: transfer.token_info.decimals,
            from: transfer.from,
            to: transfer.to,
            block_timestamp: transfer.block_timestamp,
        }
    }
}

impl TransferEvent {
    /// `raw_value / 10^decimals`, exactly.
    pub fn standard_amount(&self) -> TronResult<Decimal> {
        let raw: u128 = self.raw_value.trim().parse().map_err(|e| {
            TronError::record_parse_failure(
                &self.transaction_id,
                format!("value {:?} is not an unsigned integer: {}", self.raw_value, e),
            )
        })?;
        let raw = i128::try_from(raw).map_err(|_| {
            TronError::record_parse_failure(&self.transaction_id, "value is out of range")
        })?;

        Decimal::try_from_i128_with_scale(raw, self.decimals).map_err(|e| {
            TronError::record_parse_failure(
                &self.transaction_id,
                format!(
                    "value {} with {} decimals is out of range: {}",
                    self.raw_value, self.decimals, e
                ),
            )
        })
    }

    /// The transfer amount rounded half-up to two places.
    pub fn amount_key(&self) -> TronResult<AmountKey> {
        let amount = self.standard_amount()?;
        AmountKey::from_decimal(amount, RoundingMode::HalfUp).ok_or_else(|| {
            TronError::record_parse_failure(
                &self.transaction_id,
                format!("amount {} has no two-decimal form", amount),
            )
        })
    }

    /// Parsed token symbol, or `None` for tokens this crate does not know.
    pub fn token(&self) -> Option<TokenSymbol> {
        self.token_symbol.parse().ok()
    }

    pub fn block_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.block_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(value: &str, decimals: u32) -> TransferEvent {
        TransferEvent {
            transaction_id: "tx-1".to_string(),
            token_symbol: "USDT".to_string(),
            token_contract: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            raw_value: value.to_string(),
            decimals,
            from: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
            to: "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".to_string(),
            block_timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn token_symbol_parse_and_display() {
        assert_eq!("usdt".parse::<TokenSymbol>().unwrap(), TokenSymbol::Usdt);
        assert_eq!(" USDC ".parse::<TokenSymbol>().unwrap(), TokenSymbol::Usdc);
        assert!(matches!(
            "TRX".parse::<TokenSymbol>(),
            Err(TronError::UnsupportedToken { .. })
        ));
        assert_eq!(TokenSymbol::Usdc.to_string(), "USDC");
        assert_eq!(serde_json::to_string(&TokenSymbol::Usdt).unwrap(), "\"USDT\"");
    }

    #[test]
    fn raw_units_use_token_decimals() {
        assert_eq!(
            TokenSymbol::Usdt.to_raw_units(AmountKey::from_hundredths(123)),
            1_230_000
        );
    }

    #[test]
    fn transfer_amount_scaling() {
        assert_eq!(event("1230000", 6).standard_amount().unwrap(), dec!(1.23));
        assert_eq!(event("1230000", 6).amount_key().unwrap().to_string(), "1.23");
        assert_eq!(event("1234999", 6).amount_key().unwrap().to_string(), "1.23");
        assert_eq!(event("1235000", 6).amount_key().unwrap().to_string(), "1.24");
        assert_eq!(event("5", 0).amount_key().unwrap().to_string(), "5.00");
    }

    #[test]
    fn unparseable_value_is_record_failure() {
        assert!(matches!(
            event("12.5", 6).amount_key(),
            Err(TronError::RecordParseFailure { .. })
        ));
        assert!(matches!(
            event("-100", 6).amount_key(),
            Err(TronError::RecordParseFailure { .. })
        ));
        assert!(matches!(
            event("100", 40).amount_key(),
            Err(TronError::RecordParseFailure { .. })
        ));
    }

    #[test]
    fn trongrid_transfer_deserializes() {
        let json = r#"{
            "transaction_id": "abc",
            "token_info": {
                "symbol": "USDT",
                "address": "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
                "decimals": 6,
                "name": "Tether USD"
            },
            "block_timestamp": 1700000000000,
            "from": "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf",
            "to": "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8",
            "type": "Transfer",
            "value": "1930000"
        }"#;
        let transfer: TrongridTransfer = serde_json::from_str(json).unwrap();
        let event = TransferEvent::from(transfer);
        assert_eq!(event.token(), Some(TokenSymbol::Usdt));
        assert_eq!(event.amount_key().unwrap().to_string(), "1.93");
        assert!(event.block_time().is_some());
    }

    #[test]
    fn time_window_spans_lookback() {
        let end = DateTime::from_timestamp_millis(1_700_000_010_000).unwrap();
        let window = TimeWindow::ending_at(end, Duration::from_secs(10));
        assert_eq!(window.max_timestamp_ms, 1_700_000_010_000);
        assert_eq!(window.min_timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn address_shape() {
        assert!(is_valid_tron_address("TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"));
        assert!(!is_valid_tron_address("0x1234"));
        assert!(!is_valid_tron_address("TJRabPrwbZy45sbavfcjinPJC18kjpRTv0"));
    }
}
