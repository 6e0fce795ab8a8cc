//! Schedule source: search-backend client and in-memory schedule cache.
//!
//! The scheduler writes its decisions to an analytics index; this module
//! reduces the recent, currently-active records to a `buscode → entry`
//! map and keeps the last good copy in memory for the correlator.

mod cache;
mod client;
mod error;
mod query;

pub use cache::ScheduleCache;
pub use client::{ScheduleClient, ScheduleClientConfig};
pub use error::ScheduleError;
pub use query::{buckets_into_schedule_map, search_body, SearchResponse};
