use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{ProviderName, TradePreCreateRequest, TradePreCreateResponse};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Live provider instances keyed by payment key.
#[derive(Default)]
pub struct PaymentRegistry {
    providers: RwLock<HashMap<String, Arc<dyn PaymentProvider>>>,
}

impl PaymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its payment key. A provider previously registered under the same
    /// key is stopped once it has been swapped out.
    pub async fn add_or_update(&self, provider: Arc<dyn PaymentProvider>) {
        let key = provider.payment_key().to_string();
        let name = provider.provider_name();
        let replaced = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.clone(), provider);

        if let Some(old) = replaced {
            old.stop().await;
            info!(payment_key = %key, provider = %name, "Payment provider replaced");
        } else {
            info!(payment_key = %key, provider = %name, "Payment provider registered");
        }
    }

    pub fn get(&self, payment_key: &str) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(payment_key)
            .cloned()
            .ok_or_else(|| {
                PaymentError::validation(
                    format!("unknown payment key: {}", payment_key),
                    "payment_key",
                )
            })
    }

    /// Route an order to the provider named by `request.payment_key`.
    pub async fn trade_precreate(
        &self,
        request: TradePreCreateRequest,
    ) -> PaymentResult<TradePreCreateResponse> {
        let provider = self.get(&request.payment_key)?;
        provider.trade_precreate(request).await
    }

    /// Unregister and stop a provider. Returns whether one was registered.
    pub async fn remove(&self, payment_key: &str) -> bool {
        let removed = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(payment_key);

        match removed {
            Some(provider) => {
                provider.stop().await;
                info!(payment_key = %payment_key, "Payment provider removed");
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<(String, ProviderName)> {
        let mut entries: Vec<_> = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(key, provider)| (key.clone(), provider.provider_name()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Stop every registered provider and empty the registry.
    pub async fn stop_all(&self) {
        let drained: Vec<_> = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .collect();

        for (key, provider) in drained {
            provider.stop().await;
            info!(payment_key = %key, "Payment provider stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{Notification, NotificationOutcome, RequestExtra};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubProvider {
        key: String,
        pay_url: String,
        stopped: AtomicBool,
    }

    impl StubProvider {
        fn new(key: &str, pay_url: &str) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                pay_url: pay_url.to_string(),
                stopped: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        async fn trade_precreate(
            &self,
            request: TradePreCreateRequest,
        ) -> PaymentResult<TradePreCreateResponse> {
            Ok(TradePreCreateResponse {
                out_trade_no: request.out_trade_no,
                pay_url: self.pay_url.clone(),
                extra: Default::default(),
            })
        }

        async fn handle_notification(
            &self,
            _notification: Notification,
        ) -> PaymentResult<NotificationOutcome> {
            Ok(NotificationOutcome::Ignored)
        }

        async fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn payment_key(&self) -> &str {
            &self.key
        }

        fn provider_name(&self) -> ProviderName {
            ProviderName::Epay
        }
    }

    fn request(payment_key: &str) -> TradePreCreateRequest {
        TradePreCreateRequest {
            payment_key: payment_key.to_string(),
            product_subject: "Coffee".to_string(),
            out_trade_no: "order-1".to_string(),
            total_amount: 100,
            currency: "CNY".to_string(),
            extra: RequestExtra::None,
        }
    }

    #[tokio::test]
    async fn dispatches_by_payment_key() {
        let registry = PaymentRegistry::new();
        registry.add_or_update(StubProvider::new("a", "https://a")).await;
        registry.add_or_update(StubProvider::new("b", "https://b")).await;

        let response = registry.trade_precreate(request("b")).await.unwrap();
        assert_eq!(response.pay_url, "https://b");
        assert_eq!(registry.list().len(), 2);
    }

    #[tokio::test]
    async fn unknown_key_is_validation_error() {
        let registry = PaymentRegistry::new();
        let result = registry.trade_precreate(request("missing")).await;
        assert!(matches!(result, Err(PaymentError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn replacing_stops_old_provider() {
        let registry = PaymentRegistry::new();
        let old = StubProvider::new("a", "https://old");
        let new = StubProvider::new("a", "https://new");

        registry.add_or_update(old.clone()).await;
        registry.add_or_update(new.clone()).await;

        assert!(old.stopped.load(Ordering::SeqCst));
        assert!(!new.stopped.load(Ordering::SeqCst));
        let response = registry.trade_precreate(request("a")).await.unwrap();
        assert_eq!(response.pay_url, "https://new");
    }

    #[tokio::test]
    async fn remove_and_stop_all() {
        let registry = PaymentRegistry::new();
        let a = StubProvider::new("a", "https://a");
        let b = StubProvider::new("b", "https://b");
        registry.add_or_update(a.clone()).await;
        registry.add_or_update(b.clone()).await;

        assert!(registry.remove("a").await);
        assert!(!registry.remove("a").await);
        assert!(a.stopped.load(Ordering::SeqCst));

        registry.stop_all().await;
        assert!(b.stopped.load(Ordering::SeqCst));
        assert!(registry.list().is_empty());
    }
}
