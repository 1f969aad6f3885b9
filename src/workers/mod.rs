//! Background workers

pub mod scheduler;
pub mod transfer_poller;
