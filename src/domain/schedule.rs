//! Schedule entries from the scheduler analytics index.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::RoutingState;

/// Date format used by the scheduler index, e.g. `2026/07/31 18:30:00`.
const SCHEDULE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Scheduled routing for one buscode.
///
/// Entries are created on each schedule refresh and replaced wholesale on
/// the next; they are never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEntry {
    /// Scheduled primary source label.
    pub primary: String,
    /// Scheduled backup source label.
    pub secondary: String,
    /// Start of the schedule window, when parseable.
    pub start: Option<DateTime<Utc>>,
    /// End of the schedule window, when parseable.
    pub end: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    /// Classify a live source label against this entry.
    ///
    /// Precedence: Primary, Backup, then the deployment-specific fallback
    /// labels, then Unscheduled.
    pub fn classify(&self, source: &str, zorro: &str, tda: &str) -> RoutingState {
        if source == self.primary {
            RoutingState::Primary
        } else if source == self.secondary {
            RoutingState::Backup
        } else if source == zorro {
            RoutingState::Zorro
        } else if source == tda {
            RoutingState::Tda
        } else {
            RoutingState::Unscheduled
        }
    }
}

/// Parse a scheduler timestamp (`YYYY/MM/DD HH:MM:SS`, naive UTC).
///
/// Returns `None` on malformed input; a bad date never fails the entry.
pub fn parse_schedule_time(input: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(input, SCHEDULE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
