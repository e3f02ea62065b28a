//! Session snapshots: the minimal state needed to restore a patch so that
//! playback continues from the same seed and settings.
//!
//! Serialization itself is feature-gated; hosts that persist patches enable
//! the `serde` feature and pick their own wire format.

use crate::algorithm::AlgorithmRegistry;
use crate::sequencer::{Controls, SequencerCore};

/// Everything worth saving. Step position and gate timers are deliberately
/// absent: a restored patch restarts its sequence from the top.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Session {
    pub seed: u64,
    pub running: bool,
    /// Stable algorithm id, not a registry position; ids survive registry
    /// reordering between versions.
    pub algorithm_id: String,
    pub controls: Controls,
}

impl Session {
    /// Snapshot a core. The registry resolves the algorithm index back to
    /// its stable id; an index past the registry falls back to the default.
    pub fn capture(core: &SequencerCore, registry: &AlgorithmRegistry) -> Self {
        let algorithm_id = registry
            .ids()
            .nth(core.algorithm_index())
            .or_else(|| registry.default_id())
            .unwrap_or("")
            .to_string();
        Self {
            seed: core.seed(),
            running: core.is_running(),
            algorithm_id,
            controls: *core.controls(),
        }
    }

    /// Restore a core from this snapshot. Re-seeding marks the core seeded,
    /// so the first-use auto-seed path never fires on a loaded patch.
    pub fn apply(&self, core: &mut SequencerCore, registry: &AlgorithmRegistry) {
        let index = registry
            .ids()
            .position(|id| id == self.algorithm_id)
            .unwrap_or(0);
        core.select_algorithm(registry, index);
        core.reset(self.seed);
        core.set_running(self.running);
        core.set_controls(self.controls);
    }
}
