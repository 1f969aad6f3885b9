//! Pending Tron orders keyed by (token, amount).
//!
//! While a reservation is live no other order can be quoted the same amount in the same token,
//! so an incoming transfer of that amount identifies exactly one order.

use super::keys::tron::ReservationKey;
use super::ttl_map::TtlMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PendingOrderStore {
    reservations: TtlMap<ReservationKey, String>,
}

impl PendingOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `key` for `out_trade_no` unless another live reservation holds it.
    pub fn reserve_if_absent(
        &self,
        key: ReservationKey,
        out_trade_no: impl Into<String>,
        ttl: Duration,
    ) -> bool {
        let out_trade_no = out_trade_no.into();
        let reserved = self
            .reservations
            .insert_if_absent(key, out_trade_no.clone(), ttl);
        if reserved {
            debug!(
                key = %key,
                out_trade_no = %out_trade_no,
                ttl_secs = ttl.as_secs(),
                "amount reserved"
            );
        }
        reserved
    }

    pub fn lookup(&self, key: &ReservationKey) -> Option<String> {
        self.reservations.get(key)
    }

    /// Free a reservation before it expires.
    pub fn release(&self, key: &ReservationKey) -> bool {
        let released = self.reservations.remove(key);
        if let Some(out_trade_no) = &released {
            debug!(key = %key, out_trade_no = %out_trade_no, "reservation released");
        }
        released.is_some()
    }

    /// Atomically claim a reservation for fulfilment.
    pub fn take(&self, key: &ReservationKey) -> Option<String> {
        self.reservations.take(key)
    }

    pub fn purge_expired(&self) -> usize {
        self.reservations.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::AmountKey;
    use crate::chains::tron::types::TokenSymbol;
    use std::thread;

    const TTL: Duration = Duration::from_secs(60);

    fn usdt(hundredths: u64) -> ReservationKey {
        ReservationKey::new(TokenSymbol::Usdt, AmountKey::from_hundredths(hundredths))
    }

    fn usdc(hundredths: u64) -> ReservationKey {
        ReservationKey::new(TokenSymbol::Usdc, AmountKey::from_hundredths(hundredths))
    }

    #[test]
    fn reserve_and_lookup() {
        let store = PendingOrderStore::new();
        assert!(store.reserve_if_absent(usdt(193), "order-1", TTL));
        assert!(!store.reserve_if_absent(usdt(193), "order-2", TTL));

        assert_eq!(store.lookup(&usdt(193)).as_deref(), Some("order-1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tokens_do_not_share_amounts() {
        let store = PendingOrderStore::new();
        assert!(store.reserve_if_absent(usdt(193), "order-1", TTL));
        assert!(store.reserve_if_absent(usdc(193), "order-2", TTL));
        assert_eq!(store.lookup(&usdc(193)).as_deref(), Some("order-2"));
    }

    #[test]
    fn reservation_expires() {
        let store = PendingOrderStore::new();
        assert!(store.reserve_if_absent(usdt(100), "order-1", Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(40));

        assert_eq!(store.lookup(&usdt(100)), None);
        assert!(store.reserve_if_absent(usdt(100), "order-2", TTL));
        assert_eq!(store.lookup(&usdt(100)).as_deref(), Some("order-2"));
    }

    #[test]
    fn release_frees_key() {
        let store = PendingOrderStore::new();
        store.reserve_if_absent(usdt(100), "order-1", TTL);

        assert!(store.release(&usdt(100)));
        assert!(!store.release(&usdt(100)));
        assert!(store.is_empty());
        assert!(store.reserve_if_absent(usdt(100), "order-2", TTL));
    }

    #[test]
    fn take_claims_once() {
        let store = PendingOrderStore::new();
        store.reserve_if_absent(usdt(123), "order-1", TTL);

        assert_eq!(store.take(&usdt(123)).as_deref(), Some("order-1"));
        assert_eq!(store.take(&usdt(123)), None);
    }

    #[test]
    fn purge_counts_expired() {
        let store = PendingOrderStore::new();
        store.reserve_if_absent(usdt(1), "a", Duration::from_millis(10));
        store.reserve_if_absent(usdt(2), "b", TTL);
        thread::sleep(Duration::from_millis(30));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
