use crate::payments::error::PaymentResult;
use crate::payments::types::{
    Notification, NotificationOutcome, ProviderName, TradePreCreateRequest,
    TradePreCreateResponse,
};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a pending order and tell the caller how the payer should pay it.
    async fn trade_precreate(
        &self,
        request: TradePreCreateRequest,
    ) -> PaymentResult<TradePreCreateResponse>;

    /// Handle an inbound callback from the provider.
    async fn handle_notification(
        &self,
        notification: Notification,
    ) -> PaymentResult<NotificationOutcome>;

    /// Stop background work. Called when the provider is replaced or removed.
    async fn stop(&self);

    fn payment_key(&self) -> &str;

    fn provider_name(&self) -> ProviderName;
}
