//! Provider-agnostic payment types and the registry that routes orders to providers.

pub mod error;
pub mod fulfillment;
pub mod provider;
pub mod registry;
pub mod types;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentProvider;
pub use registry::PaymentRegistry;
