//! Shared state stores.
//!
//! Both stores are multi-reader multi-writer behind internal read-write
//! locks, with a closure-under-lock operation for updates that must stay
//! indivisible. Holders never perform I/O under a lock.

mod bus;
mod counters;
mod error;

pub use bus::{BusStateStore, DEFAULT_SNAPSHOT_PATH};
pub use counters::CountersStore;
pub use error::StoreError;
