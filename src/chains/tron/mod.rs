//! TRC20 stablecoin payments on Tron.

pub mod allocator;
pub mod client;
pub mod config;
pub mod errors;
pub mod reconciler;
pub mod service;
pub mod types;

pub use config::TronConfig;
pub use errors::{TronError, TronResult};
pub use service::TronPaymentProvider;
