pub mod cache;
pub mod chains;
pub mod config;
pub mod logging;
pub mod payments;
pub mod services;
pub mod workers;
