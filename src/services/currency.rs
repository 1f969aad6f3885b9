//! ISO-4217 minor-unit handling.
//!
//! Order totals travel through the provider contract in the currency's smallest unit (cents for
//! USD, yen for JPY). Zero-decimal currencies follow the list Stripe publishes; every other code
//! is treated as a two-decimal currency.

use rust_decimal::Decimal;

use super::exchange_rate::RoundingMode;

/// Currencies whose smallest unit equals the standard unit.
pub const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_zero_decimal(code: &str) -> bool {
    let code = normalize_code(code);
    ZERO_DECIMAL_CURRENCIES.contains(&code.as_str())
}

/// Number of fractional digits in the standard unit of `code`.
pub fn minor_unit_exponent(code: &str) -> u32 {
    if is_zero_decimal(code) {
        0
    } else {
        2
    }
}

/// `1099` USD becomes `10.99`; `500` JPY stays `500`.
pub fn to_standard_units(minor_amount: i64, code: &str) -> Decimal {
    Decimal::new(minor_amount, minor_unit_exponent(code))
}

/// Round a standard-unit amount to the precision of `code`.
pub fn quantize(amount: Decimal, code: &str, rounding: RoundingMode) -> Decimal {
    amount.round_dp_with_strategy(minor_unit_exponent(code), rounding.strategy())
}
