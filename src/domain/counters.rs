//! Per-tag classification tallies.

use serde::{Deserialize, Serialize};

use super::RoutingState;

/// Tally of destinations per routing classification for one tag.
///
/// Values are signed: push notifications decrement optimistically and the
/// next full poll is the authoritative reconciliation, so transiently
/// negative tallies are expected and must not be clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub primary: i64,
    pub backup: i64,
    pub zorro: i64,
    pub tda: i64,
    pub unscheduled: i64,
}

impl Counters {
    pub fn increment(&mut self, state: RoutingState) {
        match state {
            RoutingState::Primary => self.primary += 1,
            RoutingState::Backup => self.backup += 1,
            RoutingState::Zorro => self.zorro += 1,
            RoutingState::Tda => self.tda += 1,
            RoutingState::Unscheduled => self.unscheduled += 1,
            RoutingState::Unknown => {}
        }
    }

    pub fn decrement(&mut self, state: RoutingState) {
        match state {
            RoutingState::Primary => self.primary -= 1,
            RoutingState::Backup => self.backup -= 1,
            RoutingState::Zorro => self.zorro -= 1,
            RoutingState::Tda => self.tda -= 1,
            RoutingState::Unscheduled => self.unscheduled -= 1,
            RoutingState::Unknown => {}
        }
    }

    /// Merge another tally into this one, field by field.
    pub fn merge(&mut self, other: &Counters) {
        self.primary += other.primary;
        self.backup += other.backup;
        self.zorro += other.zorro;
        self.tda += other.tda;
        self.unscheduled += other.unscheduled;
    }

    /// Sum of all tallies.
    pub fn total(&self) -> i64 {
        self.primary + self.backup + self.zorro + self.tda + self.unscheduled
    }
}
