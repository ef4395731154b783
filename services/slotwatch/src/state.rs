//! Authoritative availability state and transition events.

use chrono::{DateTime, Utc};
use slotwatch_booking::{CombinedCheck, SlotCandidate};

/// The single availability state, written only by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityState {
    available: bool,
    last_slot: Option<SlotCandidate>,
    last_checked_at: Option<DateTime<Utc>>,
}

/// The combined availability flipped between two successful checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: bool,
    pub to: bool,

    /// Last slot seen, captured when the transition was emitted.
    pub slot: Option<SlotCandidate>,

    pub at: DateTime<Utc>,
}

impl AvailabilityState {
    pub fn available(&self) -> bool {
        self.available
    }

    /// Earliest eligible slot from the most recent check that found one.
    ///
    /// Kept after availability drops back to false.
    pub fn last_slot(&self) -> Option<&SlotCandidate> {
        self.last_slot.as_ref()
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked_at
    }

    /// Fold a successful check into the state.
    ///
    /// Returns a transition iff the availability flag changed.
    pub fn apply(&mut self, check: &CombinedCheck) -> Option<Transition> {
        self.last_checked_at = Some(check.checked_at);

        if let Some(slot) = &check.slot {
            self.last_slot = Some(slot.clone());
        }

        if check.available == self.available {
            return None;
        }

        let from = self.available;
        self.available = check.available;
        Some(Transition {
            from,
            to: check.available,
            slot: self.last_slot.clone(),
            at: check.checked_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwatch_booking::{SlotStatus, ZonedDateTime};

    fn slot(start: &str) -> SlotCandidate {
        SlotCandidate {
            status: SlotStatus::Available,
            start_date_time: ZonedDateTime {
                date_time: start.to_string(),
                time_zone: "UTC".to_string(),
            },
            end_date_time: ZonedDateTime {
                date_time: start.to_string(),
                time_zone: "UTC".to_string(),
            },
            available_count: 2,
        }
    }

    fn check(slot: Option<SlotCandidate>) -> CombinedCheck {
        CombinedCheck::reduce([slot], Utc::now())
    }

    #[test]
    fn test_starts_unavailable() {
        let state = AvailabilityState::default();
        assert!(!state.available());
        assert!(state.last_slot().is_none());
        assert!(state.last_checked_at().is_none());
    }

    #[test]
    fn test_transition_only_on_flip() {
        let mut state = AvailabilityState::default();

        assert!(state.apply(&check(None)).is_none());
        assert!(state.last_checked_at().is_some());

        let up = state
            .apply(&check(Some(slot("2030-01-01T09:00:00Z"))))
            .expect("false -> true");
        assert!(!up.from);
        assert!(up.to);
        assert_eq!(up.slot, Some(slot("2030-01-01T09:00:00Z")));

        assert!(state.apply(&check(Some(slot("2030-01-02T09:00:00Z")))).is_none());
        assert_eq!(state.last_slot(), Some(&slot("2030-01-02T09:00:00Z")));

        let down = state.apply(&check(None)).expect("true -> false");
        assert!(down.from);
        assert!(!down.to);
    }

    #[test]
    fn test_last_slot_retained_after_drop() {
        let mut state = AvailabilityState::default();
        state.apply(&check(Some(slot("2030-01-01T09:00:00Z"))));
        let down = state.apply(&check(None)).unwrap();

        assert!(!state.available());
        assert_eq!(state.last_slot(), Some(&slot("2030-01-01T09:00:00Z")));
        assert_eq!(down.slot, Some(slot("2030-01-01T09:00:00Z")));
    }
}
