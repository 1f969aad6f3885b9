//! The Tron payment provider: amount-key quoting on order creation plus a background poller that
//! matches incoming transfers back to pending orders.

use crate::cache::keys::tron::ReservationKey;
use crate::cache::keys::AmountKey;
use crate::cache::pending_orders::PendingOrderStore;
use crate::chains::tron::allocator::{Allocation, AmountKeyAllocator};
use crate::chains::tron::client::{TransferFeed, TrongridClient};
use crate::chains::tron::config::TronConfig;
use crate::chains::tron::errors::{TronError, TronResult};
use crate::chains::tron::reconciler::{ReconcileReport, Reconciler};
use crate::chains::tron::types::TokenSymbol;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::fulfillment::FulfillmentSink;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    Notification, NotificationOutcome, ProviderName, RequestExtra, ResponseExtra,
    TradePreCreateRequest, TradePreCreateResponse, TronQuote,
};
use crate::services::exchange_rate::CurrencyConverter;
use crate::workers::scheduler::{JobHandle, Scheduler};
use crate::workers::transfer_poller::TransferPoller;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct TronPaymentProvider {
    payment_key: String,
    config: TronConfig,
    store: Arc<PendingOrderStore>,
    allocator: AmountKeyAllocator,
    reconciler: Arc<Reconciler>,
    feed: Arc<dyn TransferFeed>,
    scheduler: Arc<dyn Scheduler>,
    poller: Mutex<Option<JobHandle>>,
}

impl TronPaymentProvider {
    /// Build a provider that polls Trongrid. Polling does not begin until [`Self::start`].
    pub fn new(
        payment_key: impl Into<String>,
        config: TronConfig,
        converter: Arc<dyn CurrencyConverter>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn FulfillmentSink>,
    ) -> TronResult<Self> {
        config
            .validate()
            .map_err(|e| TronError::config_error(e.to_string()))?;
        let feed = Arc::new(TrongridClient::new(&config)?);
        Self::with_feed(payment_key, config, converter, scheduler, sink, feed)
    }

    /// Build a provider over an arbitrary transfer source.
    pub fn with_feed(
        payment_key: impl Into<String>,
        config: TronConfig,
        converter: Arc<dyn CurrencyConverter>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn FulfillmentSink>,
        feed: Arc<dyn TransferFeed>,
    ) -> TronResult<Self> {
        config
            .validate()
            .map_err(|e| TronError::config_error(e.to_string()))?;

        let store = Arc::new(PendingOrderStore::new());
        let allocator = AmountKeyAllocator::new(&config, converter, store.clone());
        let reconciler = Arc::new(Reconciler::new(&config, store.clone(), sink));

        Ok(Self {
            payment_key: payment_key.into(),
            config,
            store,
            allocator,
            reconciler,
            feed,
            scheduler,
            poller: Mutex::new(None),
        })
    }

    pub async fn allocate(
        &self,
        token: TokenSymbol,
        fiat_minor_amount: i64,
        fiat_currency: &str,
        out_trade_no: &str,
    ) -> TronResult<Allocation> {
        self.allocator
            .allocate(token, fiat_minor_amount, fiat_currency, out_trade_no)
            .await
    }

    /// The order currently holding `amount` in `token`, if any.
    pub fn lookup(&self, token: TokenSymbol, amount: AmountKey) -> Option<String> {
        self.store.lookup(&ReservationKey::new(token, amount))
    }

    /// Give up a reservation before it expires, e.g. when the merchant cancels the order.
    pub fn release(&self, token: TokenSymbol, amount: AmountKey) -> bool {
        self.store.release(&ReservationKey::new(token, amount))
    }

    /// Begin background polling. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut poller = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if poller.is_some() {
            return false;
        }

        let job = TransferPoller::new(
            self.feed.clone(),
            self.reconciler.clone(),
            self.store.clone(),
            self.config.lookback_window,
        );
        *poller = Some(self.scheduler.schedule(self.config.poll_interval, Box::new(job)));

        info!(
            payment_key = %self.payment_key,
            network = self.config.network_name(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Tron transfer polling started"
        );
        true
    }

    pub async fn stop_polling(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(handle) = handle {
            handle.stop().await;
            info!(payment_key = %self.payment_key, "Tron transfer polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one poll outside the schedule.
    pub async fn poll_now(&self) -> TronResult<ReconcileReport> {
        TransferPoller::new(
            self.feed.clone(),
            self.reconciler.clone(),
            self.store.clone(),
            self.config.lookback_window,
        )
        .poll_once()
        .await
    }

    pub fn store(&self) -> &PendingOrderStore {
        &self.store
    }

    pub fn config(&self) -> &TronConfig {
        &self.config
    }

    pub fn quote(&self, allocation: &Allocation) -> TronQuote {
        let expires_at = if self.config.order_timeout.is_zero() {
            None
        } else {
            chrono::Duration::from_std(self.config.order_timeout)
                .ok()
                .map(|timeout| Utc::now() + timeout)
        };

        TronQuote {
            total_amount: allocation.amount,
            token_symbol: allocation.token,
            raw_amount: allocation.token.to_raw_units(allocation.amount).to_string(),
            pay_to: self.config.address.clone(),
            expires_at,
        }
    }
}

#[async_trait]
impl PaymentProvider for TronPaymentProvider {
    async fn trade_precreate(
        &self,
        request: TradePreCreateRequest,
    ) -> PaymentResult<TradePreCreateResponse> {
        request.validate()?;
        let params = match &request.extra {
            RequestExtra::Tron(params) => params,
            other => {
                return Err(PaymentError::validation(
                    format!("tron orders need tron parameters, got {}", other.kind()),
                    "extra",
                ))
            }
        };

        let allocation = self
            .allocate(
                params.token_symbol,
                request.total_amount,
                &request.currency,
                &request.out_trade_no,
            )
            .await?;
        let quote = self.quote(&allocation);

        debug!(
            out_trade_no = %request.out_trade_no,
            amount = %quote.total_amount,
            token = %quote.token_symbol,
            "Tron order created"
        );

        Ok(TradePreCreateResponse {
            out_trade_no: request.out_trade_no,
            pay_url: self.config.address.clone(),
            extra: ResponseExtra::Tron(quote),
        })
    }

    /// Tron has no callbacks; payments are discovered by polling.
    async fn handle_notification(
        &self,
        _notification: Notification,
    ) -> PaymentResult<NotificationOutcome> {
        Ok(NotificationOutcome::Ignored)
    }

    async fn stop(&self) {
        self.stop_polling().await;
    }

    fn payment_key(&self) -> &str {
        &self.payment_key
    }

    fn provider_name(&self) -> ProviderName {
        ProviderName::Tron
    }
}
