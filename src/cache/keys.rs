//! Type-safe cache key builders

use super::error::{CacheError, CacheResult};
use crate::services::exchange_rate::RoundingMode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const VERSION: &str = "v1";

/// A token amount at exactly two decimal places, held as integer hundredths.
///
/// Two keys are equal iff they render to the same `"X.YY"` string, which is the form shown to
/// payers and the form incoming transfers are rounded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AmountKey(u64);

impl AmountKey {
    pub const DECIMAL_PLACES: u32 = 2;
    pub const ZERO: AmountKey = AmountKey(0);
    /// One hundredth, the search step and the smallest payable amount.
    pub const SMALLEST: AmountKey = AmountKey(1);

    pub const fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    pub const fn hundredths(self) -> u64 {
        self.0
    }

    /// Round `amount` to two places. `None` for negative or out-of-range amounts.
    pub fn from_decimal(amount: Decimal, rounding: RoundingMode) -> Option<Self> {
        let rounded = amount.round_dp_with_strategy(Self::DECIMAL_PLACES, rounding.strategy());
        if rounded.is_zero() {
            return Some(Self::ZERO);
        }
        if rounded < Decimal::ZERO {
            return None;
        }
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|hundredths| hundredths.to_u64())
            .map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), Self::DECIMAL_PLACES)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The key `steps` hundredths above this one.
    pub fn checked_step(self, steps: u64) -> Option<Self> {
        self.0.checked_add(steps).map(Self)
    }
}

impl fmt::Display for AmountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for AmountKey {
    type Err = CacheError;

    /// Accepts any decimal with at most two significant fractional digits.
    fn from_str(s: &str) -> CacheResult<Self> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| CacheError::KeyError(format!("invalid amount {:?}: {}", s, e)))?;
        let key = Self::from_decimal(amount, RoundingMode::HalfUp)
            .ok_or_else(|| CacheError::KeyError(format!("amount {:?} is out of range", s)))?;
        if key.to_decimal() != amount {
            return Err(CacheError::KeyError(format!(
                "amount {:?} has more than two decimal places",
                s
            )));
        }
        Ok(key)
    }
}

impl From<AmountKey> for String {
    fn from(key: AmountKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for AmountKey {
    type Error = CacheError;

    fn try_from(value: String) -> CacheResult<Self> {
        value.parse()
    }
}

pub mod tron {
    use super::*;
    use crate::chains::tron::types::TokenSymbol;

    pub const NAMESPACE: &str = "tron";

    /// Identifies one pending Tron order: a token and the exact amount the payer was asked for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReservationKey {
        pub token: TokenSymbol,
        pub amount: AmountKey,
    }

    impl ReservationKey {
        pub fn new(token: TokenSymbol, amount: AmountKey) -> Self {
            Self { token, amount }
        }
    }

    impl fmt::Display for ReservationKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:reservation:{}:{}",
                VERSION, NAMESPACE, self.token, self.amount
            )
        }
    }

    /// A transaction that has already fulfilled an order.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct SeenTransactionKey {
        pub transaction_id: String,
    }

    impl SeenTransactionKey {
        pub fn new(transaction_id: impl Into<String>) -> Self {
            Self {
                transaction_id: transaction_id.into(),
            }
        }
    }

    impl fmt::Display for SeenTransactionKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:seen_tx:{}", VERSION, NAMESPACE, self.transaction_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::tron::types::TokenSymbol;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_key_display() {
        assert_eq!(AmountKey::from_hundredths(193).to_string(), "1.93");
        assert_eq!(AmountKey::from_hundredths(5).to_string(), "0.05");
        assert_eq!(AmountKey::from_hundredths(1000).to_string(), "10.00");
        assert_eq!(AmountKey::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_amount_key_from_decimal() {
        assert_eq!(
            AmountKey::from_decimal(dec!(1.23), RoundingMode::HalfUp),
            Some(AmountKey::from_hundredths(123))
        );
        assert_eq!(
            AmountKey::from_decimal(dec!(1.225), RoundingMode::HalfUp),
            Some(AmountKey::from_hundredths(123))
        );
        assert_eq!(
            AmountKey::from_decimal(dec!(1.229), RoundingMode::Floor),
            Some(AmountKey::from_hundredths(122))
        );
        assert_eq!(
            AmountKey::from_decimal(dec!(0.001), RoundingMode::Ceil),
            Some(AmountKey::SMALLEST)
        );
        assert_eq!(AmountKey::from_decimal(dec!(-0.01), RoundingMode::HalfUp), None);
        assert_eq!(
            AmountKey::from_decimal(dec!(-0.001), RoundingMode::HalfUp),
            Some(AmountKey::ZERO)
        );
    }

    #[test]
    fn test_amount_key_parse() {
        assert_eq!("1.23".parse::<AmountKey>().unwrap(), AmountKey::from_hundredths(123));
        assert_eq!("7".parse::<AmountKey>().unwrap(), AmountKey::from_hundredths(700));
        assert_eq!("0.50".parse::<AmountKey>().unwrap().to_string(), "0.50");
        assert!("1.234".parse::<AmountKey>().is_err());
        assert!("-1".parse::<AmountKey>().is_err());
        assert!("abc".parse::<AmountKey>().is_err());
    }

    #[test]
    fn test_amount_key_serde_as_string() {
        let key = AmountKey::from_hundredths(194);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"1.94\"");
        let back: AmountKey = serde_json::from_str("\"1.94\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_amount_key_step() {
        let key = AmountKey::from_hundredths(193);
        assert_eq!(key.checked_step(0), Some(key));
        assert_eq!(key.checked_step(1).unwrap().to_string(), "1.94");
        assert_eq!(AmountKey::from_hundredths(u64::MAX).checked_step(1), None);
    }

    #[test]
    fn test_reservation_key() {
        let key = tron::ReservationKey::new(TokenSymbol::Usdt, AmountKey::from_hundredths(123));
        assert_eq!(key.to_string(), "v1:tron:reservation:USDT:1.23");
    }

    #[test]
    fn test_seen_transaction_key() {
        let key = tron::SeenTransactionKey::new("abc123");
        assert_eq!(key.to_string(), "v1:tron:seen_tx:abc123");
    }
}
