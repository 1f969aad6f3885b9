//! In-process caching layer
//!
//! - `ttl_map`: concurrent map with per-entry expiry
//! - `pending_orders`: reservation store for amount-keyed Tron orders
//! - `keys`: typed keys, including the two-decimal [`keys::AmountKey`]

pub mod error;
pub mod keys;
pub mod pending_orders;
pub mod ttl_map;

pub use error::{CacheError, CacheResult};
pub use keys::AmountKey;
pub use pending_orders::PendingOrderStore;
pub use ttl_map::TtlMap;
