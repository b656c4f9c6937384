//! `datawatch-agent` library crate.
//!
//! Keeps the portal session alive, polls the data tracker and notifies the
//! user about new accesses. The binary entrypoint lives in `main.rs`; the
//! modules are public so integration tests can drive a cycle directly.

pub mod config;
pub mod error;
pub mod identity;
pub mod keepalive;
pub mod poller;
pub mod scheduler;
pub mod transport;
