//! Euclidean rhythm generators.
//!
//! The bucket formulation distributes `k` hits as evenly as possible over
//! `n` slots: step `i` fires iff `floor(i*k/n) != floor((i+1)*k/n)`. This
//! yields a fixed rotation of the canonical necklace (for n=8, k=3 the hits
//! land on steps 2, 5, 7), and always exactly `k` hits per cycle.

use super::{AlgoContext, Algorithm, StepEvent, SEMITONE};

/// Whether step `i` of `n` fires when `k` pulses are distributed evenly.
#[inline]
pub fn euclid_hit(i: usize, n: usize, k: usize) -> bool {
    if n == 0 {
        return false;
    }
    let i = i % n;
    (i * k) / n != ((i + 1) * k) / n
}

/// Minor-pentatonic degrees the euclidean generators draw melodies from.
const DEGREE_POOL: [i8; 6] = [0, 3, 5, 7, 10, 12];

/// Number of melody slots pre-drawn at reset.
const MELODY_LEN: usize = 8;

fn bake_melody(seed: u64) -> [i8; MELODY_LEN] {
    let mut rng = crate::rng::Rng::new(seed);
    let mut melody = [0i8; MELODY_LEN];
    for slot in melody.iter_mut() {
        *slot = DEGREE_POOL[rng.next_below(DEGREE_POOL.len() as u32) as usize];
    }
    melody
}

/// Plain euclidean generator: pulse count follows density, melody is a fixed
/// pentatonic loop baked at reset.
pub struct EuclidPulse {
    melody: [i8; MELODY_LEN],
}

impl EuclidPulse {
    pub fn new() -> Self {
        Self {
            melody: [0; MELODY_LEN],
        }
    }
}

impl Default for EuclidPulse {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for EuclidPulse {
    fn reset(&mut self, seed: u64) {
        self.melody = bake_melody(seed);
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        let n = ctx.step_count.max(1);
        let k = (ctx.density * n as f32).round() as usize;
        let hit = euclid_hit(ctx.step_index, n, k.min(n));

        let degree = self.melody[ctx.step_index % MELODY_LEN];
        let vel = 0.6 + 0.2 * ctx.rng.next_f32();

        StepEvent {
            active: hit,
            pitch: degree as f32 * SEMITONE,
            prob: 1.0,
            vel,
            gate_frac: 0.5,
            detune: 0.0,
        }
    }
}

/// Euclidean generator with a secondary accent layer: a second euclidean
/// pattern, derived from the accent control and rotated against the phrase
/// counter, decides which hits play loud.
pub struct EuclidAccent {
    melody: [i8; MELODY_LEN],
    phrase: u32,
    last_step_index: usize,
}

impl EuclidAccent {
    pub fn new() -> Self {
        Self {
            melody: [0; MELODY_LEN],
            phrase: 0,
            last_step_index: 0,
        }
    }
}

impl Default for EuclidAccent {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for EuclidAccent {
    fn reset(&mut self, seed: u64) {
        self.melody = bake_melody(seed.rotate_left(16));
        self.phrase = 0;
        self.last_step_index = 0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        // Loop boundary: the step index wrapped backward.
        if ctx.step_index < self.last_step_index {
            self.phrase = self.phrase.wrapping_add(1);
        }
        self.last_step_index = ctx.step_index;

        let n = ctx.step_count.max(1);
        let k = ((ctx.density * n as f32).round() as usize).min(n);
        let hit = euclid_hit(ctx.step_index, n, k);

        // Accent layer rotated by the phrase counter. The *3 stride is what
        // makes the accents crawl instead of sitting still.
        let k_accent = ((ctx.accent * n as f32).round() as usize).min(n);
        let accent_idx = ctx.step_index + self.phrase as usize * 3;
        let accented = euclid_hit(accent_idx % n, n, k_accent);

        let degree = self.melody[ctx.step_index % MELODY_LEN];
        let vel = if accented {
            0.95
        } else {
            0.5 + 0.15 * ctx.rng.next_f32()
        };

        StepEvent {
            active: hit,
            pitch: degree as f32 * SEMITONE,
            prob: 1.0,
            vel,
            gate_frac: if accented { 0.75 } else { 0.45 },
            detune: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn eight_three_is_the_fixed_rotation() {
        let pattern: Vec<bool> = (0..8).map(|i| euclid_hit(i, 8, 3)).collect();
        assert_eq!(
            pattern,
            vec![false, false, true, false, false, true, false, true]
        );
        // Rotation of the canonical 10010010 necklace: same gap structure.
        let canonical = [true, false, false, true, false, false, true, false];
        let matched = (0..8).any(|r| {
            (0..8).all(|i| pattern[i] == canonical[(i + r) % 8])
        });
        assert!(matched);
    }

    #[test]
    fn hit_count_equals_k() {
        for n in 1..=16 {
            for k in 0..=n {
                let hits = (0..n).filter(|&i| euclid_hit(i, n, k)).count();
                assert_eq!(hits, k, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn zero_length_never_fires() {
        assert!(!euclid_hit(0, 0, 3));
    }

    #[test]
    fn pulse_density_controls_hits_per_cycle() {
        let mut algo = EuclidPulse::new();
        algo.reset(1);
        let mut rng = Rng::new(1);
        let mut hits = 0;
        for i in 0..16 {
            let mut ctx = AlgoContext {
                step_index: i,
                step_count: 16,
                density: 0.5,
                accent: 0.0,
                last_pitch: 0.0,
                last_vel: 0.0,
                clock_hz: 2.0,
                rng: &mut rng,
            };
            if algo.generate(&mut ctx).active {
                hits += 1;
            }
        }
        assert_eq!(hits, 8);
    }

    #[test]
    fn accent_layer_rotates_per_phrase() {
        let mut algo = EuclidAccent::new();
        algo.reset(9);
        let mut rng = Rng::new(9);
        let mut loud_per_loop = Vec::new();
        for _loop_no in 0..4 {
            let mut loud = Vec::new();
            for i in 0..8 {
                let mut ctx = AlgoContext {
                    step_index: i,
                    step_count: 8,
                    density: 1.0,
                    accent: 0.25,
                    last_pitch: 0.0,
                    last_vel: 0.0,
                    clock_hz: 2.0,
                    rng: &mut rng,
                };
                let ev = algo.generate(&mut ctx);
                if ev.vel > 0.9 {
                    loud.push(i);
                }
            }
            loud_per_loop.push(loud);
        }
        // Phrase rotation moves the accents between consecutive loops.
        assert_ne!(loud_per_loop[0], loud_per_loop[1]);
    }
}
