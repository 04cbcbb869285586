//! Sequence clock for ordering outbox entries.
//!
//! The clock hands out strictly increasing sequence numbers. Replay order is
//! the order of these numbers, never wall-clock time, so a skewed device clock
//! cannot reorder a user's mutations.

use crate::Sequence;
use serde::{Deserialize, Serialize};

/// A monotonically increasing counter for outbox entries.
///
/// After a restart the clock is advanced past every persisted entry with
/// [`SequenceClock::observe`], so new entries always sort after the ones that
/// survived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceClock {
    /// Last value handed out (0 means none yet)
    pub counter: Sequence,
}

impl SequenceClock {
    /// Create a new clock starting at counter 0.
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Create a clock with a specific counter value.
    pub fn with_counter(counter: Sequence) -> Self {
        Self { counter }
    }

    /// Increment the clock and return the new value.
    pub fn tick(&mut self) -> Sequence {
        self.counter += 1;
        self.counter
    }

    /// Make sure the next tick is greater than `seq`.
    pub fn observe(&mut self, seq: Sequence) {
        self.counter = self.counter.max(seq);
    }

    /// The last value handed out.
    pub fn current(&self) -> Sequence {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = SequenceClock::new();
        assert_eq!(clock.current(), 0);
    }

    #[test]
    fn tick_increments_counter() {
        let mut clock = SequenceClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn observe_takes_max() {
        let mut clock = SequenceClock::with_counter(3);
        clock.observe(7);
        assert_eq!(clock.tick(), 8);
    }

    #[test]
    fn observe_keeps_higher_counter() {
        let mut clock = SequenceClock::with_counter(10);
        clock.observe(5);
        assert_eq!(clock.current(), 10);
    }

    #[test]
    fn serialization_format() {
        let clock = SequenceClock::with_counter(42);
        let json = serde_json::to_string(&clock).unwrap();
        assert_eq!(json, r#"{"counter":42}"#);
    }
}
