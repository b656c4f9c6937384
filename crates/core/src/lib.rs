//! Domain types shared by every `datawatch` crate.
//!
//! Nothing in here performs I/O. Storage lives in `datawatch-db`, delivery
//! in `datawatch-events` and the network side in `datawatch-agent`.

pub mod channels;
pub mod credentials;
pub mod display;
pub mod endpoints;
pub mod error;
pub mod hashing;
pub mod log_entry;
pub mod refresh;
pub mod session;
pub mod types;
