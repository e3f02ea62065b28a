//! Hypnotic generators: a 16-step pattern baked once per seed, with exactly
//! one permanently detuned "sacred" step. The evolve variant nudges a couple
//! of non-sacred steps every few loops; the sacred step is never touched.

use super::{AlgoContext, Algorithm, StepEvent, SEMITONE};
use crate::rng::Rng;

const SLOTS: usize = 16;

/// Steps eligible to carry the session's fixed detune.
const SACRED_CANDIDATES: [usize; 3] = [3, 5, 7];

/// Degrees the baked patterns draw from, in semitones.
const DEGREE_POOL: [i8; 7] = [0, 2, 3, 7, 10, 12, -5];

/// One cent in volts.
const CENT: f32 = 1.0 / 1200.0;

#[derive(Debug, Clone, Copy, Default)]
struct BakedStep {
    active: bool,
    degree: i8,
    vel: f32,
    gate_frac: f32,
}

#[derive(Debug, Clone, Copy)]
struct BakedPattern {
    steps: [BakedStep; SLOTS],
    sacred: usize,
    /// Fixed detune on the sacred step, ±15..40 cents in volts.
    sacred_detune: f32,
}

impl Default for BakedPattern {
    fn default() -> Self {
        Self {
            steps: [BakedStep::default(); SLOTS],
            sacred: SACRED_CANDIDATES[0],
            sacred_detune: 0.0,
        }
    }
}

/// Deterministically bake the session pattern from the seed alone.
fn bake(seed: u64) -> BakedPattern {
    let mut rng = Rng::new(seed);

    let mut steps = [BakedStep::default(); SLOTS];
    for (i, step) in steps.iter_mut().enumerate() {
        // Downbeats always land; the rest fill in at a fixed draw.
        let active = i % 4 == 0 || rng.chance(0.45);
        *step = BakedStep {
            active,
            degree: DEGREE_POOL[rng.next_below(DEGREE_POOL.len() as u32) as usize],
            vel: 0.55 + 0.3 * rng.next_f32(),
            gate_frac: 0.3 + 0.5 * rng.next_f32(),
        };
    }

    let sacred = SACRED_CANDIDATES[rng.next_below(SACRED_CANDIDATES.len() as u32) as usize];
    steps[sacred].active = true;

    let cents = 15.0 + 25.0 * rng.next_f32();
    let sign = if rng.chance(0.5) { 1.0 } else { -1.0 };

    BakedPattern {
        steps,
        sacred,
        sacred_detune: sign * cents * CENT,
    }
}

fn emit(pattern: &BakedPattern, ctx: &mut AlgoContext) -> StepEvent {
    let idx = ctx.step_index % SLOTS;
    let step = pattern.steps[idx];

    let mut vel = step.vel;
    if idx % 4 == 0 {
        vel = (vel * (1.0 + 0.3 * ctx.accent)).min(1.0);
    }

    StepEvent {
        active: step.active,
        pitch: step.degree as f32 * SEMITONE,
        // Locked by construction: the pattern itself is the probability.
        prob: 1.0,
        vel,
        gate_frac: step.gate_frac,
        detune: if idx == pattern.sacred {
            pattern.sacred_detune
        } else {
            0.0
        },
    }
}

/// Locked hypnotic pattern. Same seed, same sixteen steps, forever.
pub struct Hypnotic {
    pattern: BakedPattern,
}

impl Hypnotic {
    pub fn new() -> Self {
        Self {
            pattern: BakedPattern::default(),
        }
    }
}

impl Default for Hypnotic {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for Hypnotic {
    fn reset(&mut self, seed: u64) {
        self.pattern = bake(seed);
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        emit(&self.pattern, ctx)
    }
}

/// Hypnotic pattern that mutates 1–2 non-sacred active steps by ±2 semitones
/// every 4–8 loops. Higher density shortens the mutation interval.
pub struct HypnoticEvolve {
    pattern: BakedPattern,
    last_step_index: usize,
    loops_since_mutation: u32,
}

impl HypnoticEvolve {
    pub fn new() -> Self {
        Self {
            pattern: BakedPattern::default(),
            last_step_index: 0,
            loops_since_mutation: 0,
        }
    }

    /// Loops to wait before the next mutation, 4..=8 shrinking with density.
    fn mutation_interval(density: f32) -> u32 {
        let span = 8.0 - 4.0 * density.clamp(0.0, 1.0);
        (span.round() as u32).clamp(4, 8)
    }

    fn mutate(&mut self, rng: &mut Rng) {
        let count = 1 + rng.next_below(2) as usize;
        for _ in 0..count {
            // Retry a few times for an active non-sacred slot; a sparse
            // pattern may simply skip this round.
            for _ in 0..8 {
                let idx = rng.next_below(SLOTS as u32) as usize;
                if idx == self.pattern.sacred || !self.pattern.steps[idx].active {
                    continue;
                }
                let delta = if rng.chance(0.5) { 2 } else { -2 };
                let step = &mut self.pattern.steps[idx];
                step.degree = (step.degree + delta).clamp(-24, 24);
                break;
            }
        }
    }
}

impl Default for HypnoticEvolve {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for HypnoticEvolve {
    fn reset(&mut self, seed: u64) {
        self.pattern = bake(seed);
        self.last_step_index = 0;
        self.loops_since_mutation = 0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        if ctx.step_index < self.last_step_index {
            self.loops_since_mutation += 1;
            if self.loops_since_mutation >= Self::mutation_interval(ctx.density) {
                self.loops_since_mutation = 0;
                self.mutate(ctx.rng);
            }
        }
        self.last_step_index = ctx.step_index;

        emit(&self.pattern, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_at<'a>(idx: usize, density: f32, rng: &'a mut Rng) -> AlgoContext<'a> {
        AlgoContext {
            step_index: idx,
            step_count: SLOTS,
            density,
            accent: 0.0,
            last_pitch: 0.0,
            last_vel: 0.0,
            clock_hz: 2.0,
            rng,
        }
    }

    #[test]
    fn bake_is_deterministic_per_seed() {
        let a = bake(0xDEAD);
        let b = bake(0xDEAD);
        assert_eq!(a.sacred, b.sacred);
        assert_eq!(a.sacred_detune, b.sacred_detune);
        for i in 0..SLOTS {
            assert_eq!(a.steps[i].degree, b.steps[i].degree);
            assert_eq!(a.steps[i].active, b.steps[i].active);
        }
    }

    #[test]
    fn sacred_step_is_a_candidate_and_detuned() {
        for seed in 1..50u64 {
            let p = bake(seed);
            assert!(SACRED_CANDIDATES.contains(&p.sacred));
            assert!(p.steps[p.sacred].active);
            let cents = (p.sacred_detune / CENT).abs();
            assert!((15.0..=40.0).contains(&cents), "seed {seed}: {cents} cents");
        }
    }

    #[test]
    fn evolve_never_touches_the_sacred_step() {
        let mut algo = HypnoticEvolve::new();
        algo.reset(0xBEEF);
        let sacred = algo.pattern.sacred;
        let sacred_degree = algo.pattern.steps[sacred].degree;
        let sacred_detune = algo.pattern.sacred_detune;

        let mut rng = Rng::new(0xBEEF);
        // 64 loops at maximum density: plenty of mutation rounds.
        for _ in 0..64 {
            for idx in 0..SLOTS {
                let mut ctx = ctx_at(idx, 1.0, &mut rng);
                let ev = algo.generate(&mut ctx);
                if idx == sacred {
                    assert_eq!(ev.pitch, sacred_degree as f32 * SEMITONE);
                    assert_eq!(ev.detune, sacred_detune);
                }
            }
        }
    }

    #[test]
    fn evolve_mutates_other_steps_eventually() {
        let mut algo = HypnoticEvolve::new();
        algo.reset(0xBEEF);
        let before: Vec<i8> = algo.pattern.steps.iter().map(|s| s.degree).collect();

        let mut rng = Rng::new(0xBEEF);
        for _ in 0..64 {
            for idx in 0..SLOTS {
                let mut ctx = ctx_at(idx, 1.0, &mut rng);
                algo.generate(&mut ctx);
            }
        }
        let after: Vec<i8> = algo.pattern.steps.iter().map(|s| s.degree).collect();
        assert_ne!(before, after);
        // Mutations move degrees in steps of 2, so parity per slot can only
        // change in even amounts.
        for (b, a) in before.iter().zip(&after) {
            assert_eq!((b - a) % 2, 0);
        }
    }

    #[test]
    fn evolve_changes_stay_within_the_mutation_budget() {
        let mut algo = HypnoticEvolve::new();
        algo.reset(0xACE5);
        let mut rng = Rng::new(0xACE5);
        let interval = HypnoticEvolve::mutation_interval(1.0) as usize;

        let mut prev: Vec<i8> = algo.pattern.steps.iter().map(|s| s.degree).collect();
        let mut events = 0usize;
        for _ in 0..40 {
            for idx in 0..SLOTS {
                let mut ctx = ctx_at(idx, 1.0, &mut rng);
                algo.generate(&mut ctx);
            }
            let now: Vec<i8> = algo.pattern.steps.iter().map(|s| s.degree).collect();
            let changed = prev.iter().zip(&now).filter(|(a, b)| a != b).count();
            // One mutation round moves at most two slots.
            assert!(changed <= 2, "{changed} slots changed within one loop");
            if changed > 0 {
                events += 1;
            }
            prev = now;
        }
        // Rounds fire once per interval, never faster.
        assert!(events >= 1);
        assert!(events <= 40 / interval, "{events} rounds in 40 loops");
    }

    #[test]
    fn mutation_interval_shrinks_with_density() {
        assert_eq!(HypnoticEvolve::mutation_interval(0.0), 8);
        assert_eq!(HypnoticEvolve::mutation_interval(1.0), 4);
        assert!(HypnoticEvolve::mutation_interval(0.5) <= 8);
    }

    #[test]
    fn locked_variant_never_changes() {
        let mut algo = Hypnotic::new();
        algo.reset(42);
        let mut rng = Rng::new(42);
        let first: Vec<StepEvent> = (0..SLOTS)
            .map(|i| {
                let mut ctx = ctx_at(i, 1.0, &mut rng);
                ctx.accent = 0.0;
                algo.generate(&mut ctx)
            })
            .collect();
        for _ in 0..32 {
            for (i, expected) in first.iter().enumerate() {
                let mut ctx = ctx_at(i, 1.0, &mut rng);
                let ev = algo.generate(&mut ctx);
                assert_eq!(ev, *expected);
            }
        }
    }
}
