//! Matching of incoming transfers to pending orders.
//!
//! A transfer matches when it was sent to the receiving address in an accepted token and its
//! amount, rounded half-up to two places, equals a live reservation for that token. Matching
//! consumes the reservation, so an order is fulfilled at most once. Every well-formed transfer is
//! remembered once evaluated, matched or not, so a transfer re-fetched by an overlapping poll
//! window can never claim an order reserved after it was first seen.

use crate::cache::keys::tron::{ReservationKey, SeenTransactionKey};
use crate::cache::keys::AmountKey;
use crate::cache::pending_orders::PendingOrderStore;
use crate::cache::ttl_map::TtlMap;
use crate::chains::tron::config::TronConfig;
use crate::chains::tron::types::{TokenSymbol, TransferEvent};
use crate::payments::fulfillment::FulfillmentSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOrder {
    pub out_trade_no: String,
    pub transaction_id: String,
    pub token: TokenSymbol,
    pub amount: AmountKey,
}

/// What one reconciliation pass did with a batch of transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: Vec<MatchedOrder>,
    /// Well-formed transfers with no pending order at that amount.
    pub unmatched: usize,
    /// Transfers already evaluated in an earlier pass or earlier in the batch.
    pub duplicates: usize,
    /// Transfers to another address or in a token that is not accepted.
    pub ignored: usize,
    /// Transfers whose amount could not be parsed.
    pub rejected: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched + self.duplicates + self.ignored + self.rejected
    }
}

enum Outcome {
    Matched(MatchedOrder),
    Unmatched,
    Duplicate,
    Ignored,
    Rejected,
}

pub struct Reconciler {
    store: Arc<PendingOrderStore>,
    sink: Arc<dyn FulfillmentSink>,
    receiving_address: String,
    accept_tokens: Vec<TokenSymbol>,
    /// Evaluated transaction ids, with the order each one paid, if any.
    seen: TtlMap<SeenTransactionKey, Option<String>>,
    seen_ttl: Duration,
    seen_capacity: usize,
}

impl Reconciler {
    pub fn new(
        config: &TronConfig,
        store: Arc<PendingOrderStore>,
        sink: Arc<dyn FulfillmentSink>,
    ) -> Self {
        Self {
            store,
            sink,
            receiving_address: config.address.clone(),
            accept_tokens: config.accept_tokens.clone(),
            seen: TtlMap::new(),
            seen_ttl: config.seen_tx_ttl,
            seen_capacity: config.seen_tx_capacity,
        }
    }

    /// Match every transfer in `events`, fulfilling each matched order exactly once.
    pub fn reconcile(&self, events: &[TransferEvent]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for event in events {
            match self.reconcile_one(event) {
                Outcome::Matched(matched) => report.matched.push(matched),
                Outcome::Unmatched => report.unmatched += 1,
                Outcome::Duplicate => report.duplicates += 1,
                Outcome::Ignored => report.ignored += 1,
                Outcome::Rejected => report.rejected += 1,
            }
        }

        if report.total() > 0 {
            debug!(
                matched = report.matched.len(),
                unmatched = report.unmatched,
                duplicates = report.duplicates,
                ignored = report.ignored,
                rejected = report.rejected,
                "Reconciliation pass finished"
            );
        }
        report
    }

    fn reconcile_one(&self, event: &TransferEvent) -> Outcome {
        if event.to != self.receiving_address {
            return Outcome::Ignored;
        }

        let token = match event.token() {
            Some(token) if self.accept_tokens.contains(&token) => token,
            _ => {
                debug!(
                    transaction_id = %event.transaction_id,
                    token = %event.token_symbol,
                    "Ignoring transfer in unaccepted token"
                );
                return Outcome::Ignored;
            }
        };

        let seen_key = SeenTransactionKey::new(event.transaction_id.as_str());
        if self.seen.contains_key(&seen_key) {
            return Outcome::Duplicate;
        }

        let amount = match event.amount_key() {
            Ok(amount) => amount,
            Err(e) => {
                warn!(error = %e, "Skipping unparseable transfer");
                return Outcome::Rejected;
            }
        };

        let key = ReservationKey::new(token, amount);
        let Some(out_trade_no) = self.store.take(&key) else {
            self.remember(seen_key, None);
            debug!(
                transaction_id = %event.transaction_id,
                key = %key,
                "No pending order for transfer amount"
            );
            return Outcome::Unmatched;
        };

        self.remember(seen_key, Some(out_trade_no.clone()));

        info!(
            out_trade_no = %out_trade_no,
            transaction_id = %event.transaction_id,
            token = %token,
            amount = %amount,
            block_time = ?event.block_time(),
            "Order paid"
        );
        self.sink.fulfill(&out_trade_no);

        Outcome::Matched(MatchedOrder {
            out_trade_no,
            transaction_id: event.transaction_id.clone(),
            token,
            amount,
        })
    }

    fn remember(&self, key: SeenTransactionKey, out_trade_no: Option<String>) {
        if self.seen_capacity == 0 {
            return;
        }
        if self.seen.len() >= self.seen_capacity {
            self.seen.purge_expired();
            while self.seen.len() >= self.seen_capacity {
                if self.seen.evict_oldest().is_none() {
                    break;
                }
            }
        }
        self.seen.insert(key, out_trade_no, self.seen_ttl);
    }

    /// Drop expired entries from the fulfilled-transaction cache.
    pub fn purge_seen(&self) -> usize {
        self.seen.purge_expired()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
