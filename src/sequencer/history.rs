//! Fixed-capacity ring of recent step outcomes, captured each step advance
//! so an expander can reconstruct activity even when several steps fire
//! inside one host callback.

use crate::HISTORY_CAPACITY;

/// One recorded step outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    /// Resolved step index this outcome belongs to.
    pub step_index: u8,
    /// Quantized output pitch in volts (detune included).
    pub pitch: f32,
    /// Whether the step opened a gate.
    pub gate: bool,
    /// Whether it was a fresh note rather than a sustained one.
    pub new_note: bool,
}

/// Circular buffer of the last [`HISTORY_CAPACITY`] step outcomes. No
/// allocation, overwrites oldest first.
#[derive(Debug, Clone)]
pub struct StepHistory {
    slots: [StepOutcome; HISTORY_CAPACITY],
    head: usize,
    len: usize,
}

impl StepHistory {
    pub fn new() -> Self {
        Self {
            slots: [StepOutcome::default(); HISTORY_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.slots[self.head] = outcome;
        self.head = (self.head + 1) % HISTORY_CAPACITY;
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Outcomes newest-first. Consumers that key by step index should take
    /// the first occurrence they see for each index.
    pub fn iter_recent(&self) -> impl Iterator<Item = &StepOutcome> {
        (1..=self.len).map(move |back| {
            let idx = (self.head + HISTORY_CAPACITY - back) % HISTORY_CAPACITY;
            &self.slots[idx]
        })
    }
}

impl Default for StepHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(step: u8, pitch: f32) -> StepOutcome {
        StepOutcome {
            step_index: step,
            pitch,
            gate: true,
            new_note: true,
        }
    }

    #[test]
    fn newest_first_iteration() {
        let mut h = StepHistory::new();
        for i in 0..5u8 {
            h.push(outcome(i, i as f32));
        }
        let order: Vec<u8> = h.iter_recent().map(|o| o.step_index).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn overwrites_oldest_at_capacity() {
        let mut h = StepHistory::new();
        for i in 0..(HISTORY_CAPACITY as u8 + 4) {
            h.push(outcome(i, 0.0));
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        let newest = h.iter_recent().next().unwrap().step_index;
        assert_eq!(newest, HISTORY_CAPACITY as u8 + 3);
        // The first four pushes are gone.
        assert!(h.iter_recent().all(|o| o.step_index >= 4));
    }

    #[test]
    fn clear_empties_without_reallocating() {
        let mut h = StepHistory::new();
        h.push(outcome(0, 1.0));
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.iter_recent().count(), 0);
    }
}
