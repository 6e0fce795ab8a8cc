//! Per-destination routing state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RoutingState;

/// Number of consecutive Primary confirmations after which a lingering
/// transition record is considered healed.
const HEAL_THRESHOLD: u32 = 2;

/// Last observed routing classification for one destination.
///
/// `transition` marks when the destination left Primary; it survives the
/// return to Primary until enough consecutive confirmations have been seen,
/// so a flapping destination keeps its original deviation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusState {
    pub state: RoutingState,
    pub transition: Option<DateTime<Utc>>,
    pub heals: u32,
}

impl BusState {
    /// Create a record for a destination observed for the first time.
    pub fn new(state: RoutingState) -> Self {
        Self {
            state,
            transition: None,
            heals: 0,
        }
    }

    /// Replace the stored state, returning the previous one.
    pub fn swap(&mut self, state: RoutingState) -> RoutingState {
        std::mem::replace(&mut self.state, state)
    }

    /// Record that the destination just left Primary at `at`.
    pub fn mark_transition(&mut self, at: DateTime<Utc>) {
        self.transition = Some(at);
        self.heals = 0;
    }

    /// Count a Primary classification against a lingering transition record.
    ///
    /// Returns true when the record healed (three consecutive Primary
    /// classifications) and the transition window was cleared.
    pub fn confirm_primary(&mut self) -> bool {
        if self.transition.is_none() {
            return false;
        }

        self.heals += 1;

        if self.heals > HEAL_THRESHOLD {
            self.transition = None;
            self.heals = 0;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_returns_previous() {
        let mut bs = BusState::new(RoutingState::Primary);
        let prev = bs.swap(RoutingState::Backup);
        assert_eq!(prev, RoutingState::Primary);
        assert_eq!(bs.state, RoutingState::Backup);
    }

    #[test]
    fn new_record_has_no_transition() {
        let bs = BusState::new(RoutingState::Backup);
        assert!(bs.transition.is_none());
        assert_eq!(bs.heals, 0);
    }

    #[test]
    fn three_primary_confirmations_heal() {
        let mut bs = BusState::new(RoutingState::Backup);
        bs.mark_transition(Utc::now());

        bs.swap(RoutingState::Primary);

        assert!(!bs.confirm_primary());
        assert!(!bs.confirm_primary());
        assert!(bs.confirm_primary());

        assert!(bs.transition.is_none());
        assert_eq!(bs.heals, 0);
    }

    #[test]
    fn confirm_without_transition_is_noop() {
        let mut bs = BusState::new(RoutingState::Primary);
        assert!(!bs.confirm_primary());
        assert_eq!(bs.heals, 0);
    }

    #[test]
    fn mark_transition_resets_heals() {
        let mut bs = BusState::new(RoutingState::Primary);
        bs.mark_transition(Utc::now());
        bs.swap(RoutingState::Primary);
        bs.confirm_primary();
        assert_eq!(bs.heals, 1);

        bs.mark_transition(Utc::now());
        assert_eq!(bs.heals, 0);
    }
}
