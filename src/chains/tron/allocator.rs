//! Amount-key allocation.
//!
//! Each pending order is quoted a token amount that no other live order in the same token has.
//! The allocator converts the fiat total, then steps upward one cent at a time until a free
//! amount is reserved. Payers therefore pay at most `max_search_attempts - 1` cents above the
//! converted price.

use crate::cache::keys::tron::ReservationKey;
use crate::cache::keys::AmountKey;
use crate::cache::pending_orders::PendingOrderStore;
use crate::chains::tron::config::TronConfig;
use crate::chains::tron::errors::{TronError, TronResult};
use crate::chains::tron::types::TokenSymbol;
use crate::services::exchange_rate::{CurrencyConverter, RoundingMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A reserved amount for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub token: TokenSymbol,
    pub amount: AmountKey,
    /// Slots tried, including the one that was reserved.
    pub attempts: u32,
}

impl Allocation {
    pub fn reservation_key(&self) -> ReservationKey {
        ReservationKey::new(self.token, self.amount)
    }
}

pub struct AmountKeyAllocator {
    converter: Arc<dyn CurrencyConverter>,
    store: Arc<PendingOrderStore>,
    accept_tokens: Vec<TokenSymbol>,
    quote_currency: String,
    rounding: RoundingMode,
    min_amount: Option<AmountKey>,
    max_attempts: u32,
    order_timeout: Duration,
}

impl AmountKeyAllocator {
    pub fn new(
        config: &TronConfig,
        converter: Arc<dyn CurrencyConverter>,
        store: Arc<PendingOrderStore>,
    ) -> Self {
        Self {
            converter,
            store,
            accept_tokens: config.accept_tokens.clone(),
            quote_currency: config.quote_currency.clone(),
            rounding: config.rounding,
            min_amount: config.min_amount,
            max_attempts: config.max_search_attempts,
            order_timeout: config.order_timeout,
        }
    }

    /// Reserve a unique amount in `token` for an order worth `fiat_minor_amount` of
    /// `fiat_currency`.
    pub async fn allocate(
        &self,
        token: TokenSymbol,
        fiat_minor_amount: i64,
        fiat_currency: &str,
        out_trade_no: &str,
    ) -> TronResult<Allocation> {
        if !self.accept_tokens.contains(&token) {
            return Err(TronError::unsupported_token(token.as_str()));
        }

        let converted = self
            .converter
            .convert_to_standard_unit(
                fiat_minor_amount,
                fiat_currency,
                &self.quote_currency,
                self.rounding,
            )
            .await?;
        let base = self.base_amount(converted)?;

        debug!(
            out_trade_no = %out_trade_no,
            token = %token,
            fiat_amount = fiat_minor_amount,
            fiat_currency = %fiat_currency,
            converted = %converted,
            base = %base,
            "Allocating amount key"
        );

        self.reserve_from(token, base, out_trade_no)
    }

    fn base_amount(&self, converted: Decimal) -> TronResult<AmountKey> {
        match AmountKey::from_decimal(converted, self.rounding) {
            Some(key) if !key.is_zero() => Ok(key),
            _ => match self.min_amount {
                Some(floor) => {
                    debug!(converted = %converted, floor = %floor, "Clamped non-positive amount");
                    Ok(floor)
                }
                None => Err(TronError::conversion_failure(format!(
                    "converted amount {} is not payable",
                    converted
                ))),
            },
        }
    }

    /// Try `base`, `base + 0.01`, ... and reserve the first free slot.
    pub fn reserve_from(
        &self,
        token: TokenSymbol,
        base: AmountKey,
        out_trade_no: &str,
    ) -> TronResult<Allocation> {
        for offset in 0..self.max_attempts {
            let Some(candidate) = base.checked_step(u64::from(offset)) else {
                break;
            };

            let key = ReservationKey::new(token, candidate);
            if self.store.reserve_if_absent(key, out_trade_no, self.order_timeout) {
                info!(
                    out_trade_no = %out_trade_no,
                    token = %token,
                    amount = %candidate,
                    attempts = offset + 1,
                    "Amount key allocated"
                );
                return Ok(Allocation {
                    token,
                    amount: candidate,
                    attempts: offset + 1,
                });
            }
        }

        warn!(
            out_trade_no = %out_trade_no,
            token = %token,
            base = %base,
            attempts = self.max_attempts,
            "Amount key space exhausted"
        );
        Err(TronError::allocation_exhausted(
            base.to_string(),
            self.max_attempts,
        ))
    }
}
