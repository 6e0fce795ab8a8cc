//! Routing classification and event kind enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a destination's live source relates to its schedule.
///
/// `Unknown` is an initial value only; it must never appear in emitted
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoutingState {
    #[default]
    Unknown,
    Primary,
    Backup,
    Zorro,
    Tda,
    Unscheduled,
}

impl RoutingState {
    /// The display string used in events and notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingState::Unknown => "unknown",
            RoutingState::Primary => "Primary",
            RoutingState::Backup => "Backup",
            RoutingState::Zorro => "Zorro",
            RoutingState::Tda => "TDA",
            RoutingState::Unscheduled => "UnscheduledAudio",
        }
    }
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced a batch of edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Full fetch from the polling client.
    Query,
    /// Push update from the subscription client.
    Notification,
    /// Per-batch roll-up emitted by the correlator.
    Summary,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Query => "query",
            EventKind::Notification => "notification",
            EventKind::Summary => "summary",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
