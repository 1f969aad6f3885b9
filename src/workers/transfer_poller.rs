use crate::cache::pending_orders::PendingOrderStore;
use crate::chains::tron::client::TransferFeed;
use crate::chains::tron::errors::TronResult;
use crate::chains::tron::reconciler::{ReconcileReport, Reconciler};
use crate::chains::tron::types::TimeWindow;
use crate::workers::scheduler::PeriodicJob;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polls the transfer feed over a sliding window and hands each batch to the reconciler.
///
/// Windows overlap between ticks whenever the lookback exceeds the poll interval; the reconciler
/// absorbs the resulting duplicates.
pub struct TransferPoller {
    feed: Arc<dyn TransferFeed>,
    reconciler: Arc<Reconciler>,
    store: Arc<PendingOrderStore>,
    lookback_window: Duration,
}

impl TransferPoller {
    pub fn new(
        feed: Arc<dyn TransferFeed>,
        reconciler: Arc<Reconciler>,
        store: Arc<PendingOrderStore>,
        lookback_window: Duration,
    ) -> Self {
        Self {
            feed,
            reconciler,
            store,
            lookback_window,
        }
    }

    /// Fetch the current window and reconcile it.
    pub async fn poll_once(&self) -> TronResult<ReconcileReport> {
        let window = TimeWindow::ending_now(self.lookback_window);
        let events = self.feed.fetch_incoming(window).await?;
        Ok(self.reconciler.reconcile(&events))
    }

    fn sweep(&self) {
        let expired = self.store.purge_expired();
        let forgotten = self.reconciler.purge_seen();
        if expired > 0 || forgotten > 0 {
            debug!(
                expired_reservations = expired,
                forgotten_transactions = forgotten,
                "Swept expired entries"
            );
        }
    }
}

#[async_trait]
impl PeriodicJob for TransferPoller {
    fn name(&self) -> &str {
        "tron-transfer-poller"
    }

    async fn run_once(&mut self) {
        self.sweep();

        match self.poll_once().await {
            Ok(report) if !report.matched.is_empty() => {
                info!(
                    matched = report.matched.len(),
                    pending = self.store.len(),
                    "Transfer poll fulfilled orders"
                );
            }
            Ok(_) => {}
            Err(e) => {
                // The next window overlaps this one, so a skipped tick loses nothing that is
                // still inside the lookback.
                warn!(error = %e, "Transfer poll failed; skipping tick");
            }
        }
    }
}
