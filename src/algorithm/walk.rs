//! Walk-family generators: free random walk, mean-reverting drift, and the
//! classic acid-style chromatic walk with periodic recentering.

use super::{AlgoContext, Algorithm, StepEvent, SEMITONE};

/// Pitch clamp for the walkers, in volts (±2 octaves around center).
const WALK_RANGE: f32 = 2.0;

fn clamp_pitch(v: f32) -> f32 {
    v.clamp(-WALK_RANGE, WALK_RANGE)
}

/// Mixed-magnitude random walk. Activation probability tracks density; gate
/// length is drawn from three weighted bands.
pub struct RandomWalk;

impl RandomWalk {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for RandomWalk {
    fn reset(&mut self, _seed: u64) {}

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        let rng = &mut *ctx.rng;

        // Large jump 30% of the time, small chromatic move otherwise.
        let magnitude = if rng.chance(0.3) {
            (3 + rng.next_below(5)) as f32
        } else {
            (1 + rng.next_below(2)) as f32
        };
        let sign = if rng.chance(0.5) { 1.0 } else { -1.0 };
        let pitch = clamp_pitch(ctx.last_pitch + sign * magnitude * SEMITONE);

        // Short / medium / long gate bands, weighted toward short.
        let gate_frac = match rng.next_f32() {
            r if r < 0.5 => 0.25,
            r if r < 0.85 => 0.5,
            _ => 0.9,
        };

        let mut vel = 0.55 + 0.25 * rng.next_f32();
        if rng.chance(ctx.accent * 0.5) {
            vel = (vel + 0.45).min(1.0);
        }

        StepEvent {
            active: true,
            pitch,
            prob: ctx.density,
            vel,
            gate_frac,
            detune: 0.0,
        }
    }
}

/// Mean-reverting walker: a slowly drifting center pulls the melody back
/// toward itself, so lines wander without ever running away.
pub struct CenterDrift {
    center: f32,
}

impl CenterDrift {
    pub fn new() -> Self {
        Self { center: 0.0 }
    }
}

impl Default for CenterDrift {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for CenterDrift {
    fn reset(&mut self, _seed: u64) {
        self.center = 0.0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        let rng = &mut *ctx.rng;

        self.center += (rng.next_f32() - 0.5) * 0.05;
        self.center = self.center.clamp(-4.0, 4.0);

        let jitter = (rng.next_f32() - 0.5) * 2.0 * SEMITONE;
        let pitch = 0.7 * self.center + 0.3 * ctx.last_pitch + jitter;

        let gate_frac = 0.4 + 0.4 * rng.next_f32();
        let mut vel = 0.5 + 0.3 * rng.next_f32();
        if rng.chance(ctx.accent * 0.4) {
            vel = (vel + 0.4).min(1.0);
        }

        StepEvent {
            active: true,
            pitch,
            prob: ctx.density,
            vel,
            gate_frac,
            detune: 0.0,
        }
    }
}

/// Chromatic acid walk over an integer scale-degree accumulator. Motion
/// favors small steps, recenters when drift exceeds ±24 semitones or after
/// 16 steps without a recenter, and splits gate character between slides
/// and stabs.
pub struct AcidWalk {
    degree: i32,
    steps_since_recenter: u32,
}

impl AcidWalk {
    /// Drift bound in semitones before the walk is pulled back in.
    const MAX_DRIFT: i32 = 24;
    /// Steps allowed without a recenter.
    const RECENTER_PERIOD: u32 = 16;

    pub fn new() -> Self {
        Self {
            degree: 0,
            steps_since_recenter: 0,
        }
    }
}

impl Default for AcidWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for AcidWalk {
    fn reset(&mut self, _seed: u64) {
        self.degree = 0;
        self.steps_since_recenter = 0;
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        let rng = &mut *ctx.rng;

        // 60% small chromatic, 25% medium jump, 15% octave.
        let magnitude = match rng.next_f32() {
            r if r < 0.6 => (1 + rng.next_below(2)) as i32,
            r if r < 0.85 => (3 + rng.next_below(3)) as i32,
            _ => 12,
        };
        let delta = if rng.chance(0.5) { magnitude } else { -magnitude };
        self.degree += delta;
        self.steps_since_recenter += 1;

        if self.degree.abs() > Self::MAX_DRIFT
            || self.steps_since_recenter >= Self::RECENTER_PERIOD
        {
            // Halve rather than zero, so the recenter is heard as a pull,
            // not a cut.
            self.degree /= 2;
            self.steps_since_recenter = 0;
        }

        let pitch = self.degree as f32 * SEMITONE;

        // Slides hold through the step boundary; stabs chop short.
        let slide = rng.chance(0.35);
        let gate_frac = if slide {
            0.95 + 0.05 * rng.next_f32()
        } else {
            0.2 + 0.2 * rng.next_f32()
        };

        let base_vel = if slide { 0.5 } else { 0.65 };
        let mut vel = base_vel + 0.2 * rng.next_f32();
        if !slide && rng.chance(ctx.accent) {
            vel = 1.0;
        }

        StepEvent {
            active: true,
            pitch,
            prob: ctx.density,
            vel: vel.min(1.0),
            gate_frac,
            detune: 0.0,
        }
    }
}
