//! Domain types for route validation.
//!
//! The core model: a destination (keyed by buscode) has a scheduled
//! primary/backup source pair, a live routing classification, and a small
//! state machine tracking deviations from Primary.

mod bus;
mod counters;
mod schedule;
mod state;

pub use bus::BusState;
pub use counters::Counters;
pub use schedule::{parse_schedule_time, ScheduleEntry};
pub use state::{EventKind, RoutingState};
