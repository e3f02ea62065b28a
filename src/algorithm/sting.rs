//! "Sting" pattern generators: a fixed 16-slot riff skeleton with
//! probabilistic ghost notes, and a euclidean-derived variant whose hit
//! pattern crawls forward one phrase at a time.

use super::{euclid_hit, AlgoContext, Algorithm, StepEvent, SEMITONE};

const SLOTS: usize = 16;

/// Anchor hits: the skeleton of the riff, always eligible.
const ANCHOR: [bool; SLOTS] = [
    true, false, false, true, false, false, true, false, //
    false, true, false, false, true, false, false, true,
];

/// Ghost hits: filler notes layered in as density rises.
const GHOST: [bool; SLOTS] = [
    false, true, true, false, true, false, false, true, //
    true, false, true, true, false, true, true, false,
];

/// Scale degree per slot, in semitones above the root.
const DEGREE: [i8; SLOTS] = [
    0, 12, 3, 0, 7, 3, 10, 12, //
    0, 5, 3, 15, 7, 0, 10, 3,
];

/// Slots that carry the accent when the accent control allows it.
const ACCENT: [bool; SLOTS] = [
    true, false, false, false, true, false, false, false, //
    true, false, false, true, false, false, true, false,
];

/// Fixed-table sting riff with a slowly drifting lead-octave offset.
pub struct StingPattern {
    /// Lead octave in volts, drifts through {-1, 0, +1}.
    lead_octave: i32,
}

impl StingPattern {
    pub fn new() -> Self {
        Self { lead_octave: 0 }
    }
}

impl Default for StingPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for StingPattern {
    fn reset(&mut self, _seed: u64) {
        self.lead_octave = 0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        let rng = &mut *ctx.rng;
        let idx = ctx.step_index % SLOTS;

        // Rare octave drift, clamped to one octave either side.
        if rng.chance(0.04) {
            let dir = if rng.chance(0.5) { 1 } else { -1 };
            self.lead_octave = (self.lead_octave + dir).clamp(-1, 1);
        }

        let anchor = ANCHOR[idx];
        let ghost = GHOST[idx];
        let (active, prob) = if anchor {
            (true, 0.7 + 0.3 * ctx.density)
        } else if ghost {
            (true, 0.6 * ctx.density)
        } else {
            (false, 0.0)
        };

        let accented = ACCENT[idx] && rng.chance(ctx.accent);
        let vel = if accented {
            1.0
        } else if anchor {
            0.7 + 0.1 * rng.next_f32()
        } else {
            0.4 + 0.15 * rng.next_f32()
        };

        StepEvent {
            active,
            pitch: DEGREE[idx] as f32 * SEMITONE + self.lead_octave as f32,
            prob,
            vel,
            gate_frac: if accented { 0.8 } else { 0.35 },
            detune: 0.0,
        }
    }
}

/// Sting variant that recomputes its hit pattern each step from the density
/// control via a euclidean distribution, rotated by a phrase counter that
/// advances at every loop boundary.
pub struct StingEuclid {
    phrase: u32,
    last_step_index: usize,
}

impl StingEuclid {
    pub fn new() -> Self {
        Self {
            phrase: 0,
            last_step_index: 0,
        }
    }
}

impl Default for StingEuclid {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for StingEuclid {
    fn reset(&mut self, _seed: u64) {
        self.phrase = 0;
        self.last_step_index = 0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        // Loop boundary detection: step index wrapped backward.
        if ctx.step_index < self.last_step_index {
            self.phrase = self.phrase.wrapping_add(1);
        }
        self.last_step_index = ctx.step_index;

        let n = ctx.step_count.max(1);
        let k = ((ctx.density * n as f32).round() as usize).min(n);

        // The *3 stride is load-bearing: coprime with common loop lengths,
        // so the rotation cycles through every alignment before repeating.
        let rotated = (ctx.step_index + self.phrase as usize * 3) % n;
        let hit = euclid_hit(rotated, n, k);

        let degree = DEGREE[(ctx.step_index + self.phrase as usize) % SLOTS];
        let accented = ACCENT[ctx.step_index % SLOTS] && ctx.rng.chance(ctx.accent);
        let vel = if accented {
            0.95
        } else {
            0.5 + 0.2 * ctx.rng.next_f32()
        };

        StepEvent {
            active: hit,
            pitch: degree as f32 * SEMITONE,
            prob: 1.0,
            vel,
            gate_frac: if accented { 0.7 } else { 0.4 },
            detune: 0.0,
        }
    }
}
