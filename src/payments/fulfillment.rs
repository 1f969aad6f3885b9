//! Delivery of paid orders to the host application.

use tokio::sync::mpsc;
use tracing::error;

/// Receives the merchant order id of every order whose payment was observed. Called at most once
/// per order.
pub trait FulfillmentSink: Send + Sync {
    fn fulfill(&self, out_trade_no: &str);
}

impl<F> FulfillmentSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn fulfill(&self, out_trade_no: &str) {
        self(out_trade_no)
    }
}

/// Forwards fulfilled order ids onto an unbounded channel so the host can process them off the
/// polling task.
#[derive(Debug, Clone)]
pub struct ChannelFulfillmentSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelFulfillmentSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FulfillmentSink for ChannelFulfillmentSink {
    fn fulfill(&self, out_trade_no: &str) {
        if self.sender.send(out_trade_no.to_string()).is_err() {
            error!(
                out_trade_no = %out_trade_no,
                "Fulfillment receiver dropped; paid order was not delivered"
            );
        }
    }
}
