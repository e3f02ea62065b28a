//! The generative sequencer core: a single-threaded state machine driven
//! once per sample (or per small block) from the host's realtime callback.
//!
//! Everything here is allocation-free and bounded: waiting for a clock edge
//! means returning to the host and being called again next sample, never
//! blocking. All failure handling is silent self-correction; the only
//! observable degradation is [`SequencerCore::clock_locked`] going false.

pub mod clock;
pub mod history;
pub mod message;

pub use clock::{knob_to_hz, step_timing, ClockEngine, StepTiming, FALLBACK_PERIOD, PIVOT_HZ};
pub use history::{StepHistory, StepOutcome};
pub use message::{ControlMessage, MessageReceiver, NoMessages};

use crate::algorithm::{AlgoContext, Algorithm, AlgorithmRegistry};
use crate::bus::{ExpanderStep, ExpanderToMaster, HistorySlot, MasterToExpander, MASTER_HISTORY_SLOTS};
use crate::quantizer::Quantizer;
use crate::rng::Rng;
use crate::MAX_STEPS;

/// Seed used when the host starts the core without ever providing one.
/// Loading a saved session suppresses this path entirely.
const FIRST_USE_SEED: u64 = 0xC0FF_EE00_0BAD_5EED;

/// Floor for step and gate durations, seconds.
const MIN_DURATION: f32 = 1e-3;

/// Playback order of the step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    #[default]
    Forward = 0,
    Reverse = 1,
    PingPong = 2,
    Random = 3,
}

impl Direction {
    /// Host panels deliver this as a numeric control; out-of-range clamps.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => Direction::Reverse,
            2 => Direction::PingPong,
            3 => Direction::Random,
            _ => Direction::Forward,
        }
    }
}

/// Host-forwarded control values, already normalized to semantic ranges.
/// Out-of-range values are clamped inside the core, never rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Controls {
    /// Sequence length, clamped to `1..=MAX_STEPS`.
    pub steps: u32,
    /// Rotation applied to the resolved step index.
    pub offset: u32,
    pub density: f32,
    pub accent: f32,
    /// Global gate-length scale in `(0, 1]`.
    pub gate_percent: f32,
    /// Odd steps are lengthened (or shortened) by this fraction, `±0.75`.
    pub swing: f32,
    /// Division exponent: free-run step rate is `2^knob * 2 Hz`.
    pub rate_knob: f32,
    pub direction: Direction,
    pub scale_index: usize,
    /// Quantizer root in volts.
    pub root: f32,
    /// Quantizer transpose in volts.
    pub transpose: f32,
}

impl Controls {
    fn clamped(mut self) -> Self {
        self.steps = self.steps.clamp(1, MAX_STEPS as u32);
        self.density = self.density.clamp(0.0, 1.0);
        self.accent = self.accent.clamp(0.0, 1.0);
        self.gate_percent = self.gate_percent.clamp(0.01, 1.0);
        self.swing = self.swing.clamp(-0.75, 0.75);
        self
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            steps: 16,
            offset: 0,
            density: 0.7,
            accent: 0.5,
            gate_percent: 0.9,
            swing: 0.0,
            rate_knob: 0.0,
            direction: Direction::Forward,
            scale_index: 0,
            root: 0.0,
            transpose: 0.0,
        }
    }
}

/// Everything the host hands the core for one processing cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs {
    /// Seconds elapsed since the previous cycle.
    pub dt: f32,
    /// Rising edge detected on the external clock input this cycle.
    pub clock_edge: bool,
    /// Whether an external clock cable is patched at all.
    pub external_clock_connected: bool,
    pub reset_edge: bool,
    pub run_toggle: bool,
    pub reseed_trigger: bool,
    pub controls: Controls,
}

impl Default for CycleInputs {
    fn default() -> Self {
        Self {
            dt: 1.0 / 48_000.0,
            clock_edge: false,
            external_clock_connected: false,
            reset_edge: false,
            run_toggle: false,
            reseed_trigger: false,
            controls: Controls::default(),
        }
    }
}

/// Per-cycle outputs; the host maps these onto jacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleOutputs {
    /// Quantized pitch in volts.
    pub pitch: f32,
    pub gate: bool,
    /// Velocity in `[0, 1]`; host scales to 0–10 V.
    pub velocity: f32,
    /// One-cycle pulse at each loop completion (direction-dependent).
    pub end_of_cycle: bool,
    /// True when this cycle started a fresh note rather than sustaining one;
    /// downstream envelopes re-trigger on it.
    pub new_note: bool,
    /// Steps fired within this cycle (clock multiplication can exceed 1).
    pub steps_advanced: u32,
}

/// Edge flags accumulated across one cycle, kept for bus capture.
#[derive(Debug, Clone, Copy, Default)]
struct CycleFlags {
    clock_edge: bool,
    reset_edge: bool,
    reseed_edge: bool,
    end_of_cycle: bool,
    new_note: bool,
    steps_advanced: u32,
}

/// The sequencer state machine. One instance per module; lives until the
/// host destroys the module.
pub struct SequencerCore {
    seed: u64,
    seeded: bool,
    rng: Rng,
    running: bool,

    algorithm: Box<dyn Algorithm>,
    algorithm_index: usize,

    quantizer: Quantizer,
    cached_revision: u64,

    clock: ClockEngine,
    phase: f32,
    step_duration: f32,
    substep_duration: f32,
    pending_substeps: u32,
    edges_until_step: u32,

    play_counter: usize,
    pong_position: usize,
    pong_descending: bool,
    current_step: usize,
    restart_pending: bool,

    raw_pitch: f32,
    detune: f32,
    note_active: bool,
    out_pitch: f32,
    out_vel: f32,
    gate_timer: f32,
    gate_high: bool,

    controls: Controls,
    history: StepHistory,
    cycle: CycleFlags,
}

impl SequencerCore {
    /// Build a core using `algorithm_id`, falling back to the registry's
    /// default entry when the id is unknown. `None` only for an empty
    /// registry.
    pub fn new(registry: &AlgorithmRegistry, algorithm_id: &str) -> Option<Self> {
        let (resolved, algorithm) = registry.create_or_default(algorithm_id)?;
        let algorithm_index = registry.ids().position(|id| id == resolved).unwrap_or(0);
        Some(Self {
            seed: 0,
            seeded: false,
            rng: Rng::default(),
            running: false,
            algorithm,
            algorithm_index,
            quantizer: Quantizer::new(),
            cached_revision: 0,
            clock: ClockEngine::new(),
            phase: 0.0,
            step_duration: FALLBACK_PERIOD,
            substep_duration: FALLBACK_PERIOD,
            pending_substeps: 0,
            edges_until_step: 1,
            play_counter: 0,
            pong_position: 0,
            pong_descending: false,
            current_step: 0,
            restart_pending: true,
            raw_pitch: 0.0,
            detune: 0.0,
            note_active: false,
            out_pitch: 0.0,
            out_vel: 0.0,
            gate_timer: 0.0,
            gate_high: false,
            controls: Controls::default(),
            history: StepHistory::new(),
            cycle: CycleFlags::default(),
        })
    }

    /// Re-seed everything: the only path that changes the stored seed.
    pub fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.seeded = true;
        self.rng.reseed(seed);
        self.algorithm.reset(seed);
        self.restart_pending = true;
        self.play_counter = 0;
        self.pong_position = 0;
        self.pong_descending = false;
        self.current_step = 0;
        self.phase = 0.0;
        self.step_duration = FALLBACK_PERIOD;
        self.substep_duration = FALLBACK_PERIOD;
        self.pending_substeps = 0;
        self.edges_until_step = 1;
        self.raw_pitch = 0.0;
        self.detune = 0.0;
        self.out_pitch = 0.0;
        self.out_vel = 0.0;
        self.gate_high = false;
        self.gate_timer = 0.0;
        self.note_active = false;
        self.history.clear();
    }

    /// Rewind to step 0 and replay the stored seed's sequence from the top.
    /// Identical to [`SequencerCore::reset`] except the seed is kept, so
    /// the replay is sample-for-sample the same run. The external clock's
    /// period estimate survives; it measures hardware, not sequence state.
    pub fn restart(&mut self) {
        let seeded = self.seeded;
        self.reset(self.seed);
        self.seeded = seeded;
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether a seed has been provided (or auto-generated on first run).
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn algorithm_index(&self) -> usize {
        self.algorithm_index
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn history(&self) -> &StepHistory {
        &self.history
    }

    /// External-clock lock indicator; false degrades the panel light, output
    /// keeps running off the last period estimate.
    pub fn clock_locked(&self) -> bool {
        self.clock.locked()
    }

    pub(crate) fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Preload controls outside the process loop, e.g. when restoring a
    /// session before the host's first cycle.
    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls.clamped();
    }

    /// Switch algorithm by registry position. Unknown positions fall back to
    /// the default entry; the new instance is reset with the current seed.
    pub fn select_algorithm(&mut self, registry: &AlgorithmRegistry, index: usize) {
        let id = registry
            .ids()
            .nth(index)
            .or_else(|| registry.default_id())
            .map(str::to_string);
        let Some(id) = id else { return };
        if let Some((resolved, mut algorithm)) = registry.create_or_default(&id) {
            algorithm.reset(self.seed);
            self.algorithm_index = registry.ids().position(|i| i == resolved).unwrap_or(0);
            self.algorithm = algorithm;
        }
    }

    /// Drain pending control messages from a non-audio thread.
    pub fn drain_messages<R: MessageReceiver>(
        &mut self,
        rx: &mut R,
        registry: &AlgorithmRegistry,
    ) {
        while let Some(msg) = rx.pop() {
            match msg {
                ControlMessage::SetRunning(on) => self.running = on,
                ControlMessage::ToggleRun => self.running = !self.running,
                ControlMessage::Restart => self.restart(),
                ControlMessage::Reseed(seed) => self.reset(seed),
                ControlMessage::SelectAlgorithm(index) => {
                    self.select_algorithm(registry, index)
                }
            }
        }
    }

    /// One processing cycle. Bounded work, no allocation.
    pub fn process(&mut self, inputs: &CycleInputs) -> CycleOutputs {
        let controls = inputs.controls.clamped();
        self.controls = controls;
        self.cycle = CycleFlags::default();

        self.quantizer.set_scale(controls.scale_index);
        self.quantizer.set_root(controls.root);
        self.quantizer.set_transpose(controls.transpose);

        // Scale changed under a sustained note: re-snap immediately instead
        // of waiting for the next step boundary. The only place output
        // changes outside a step advance.
        let revision = self.quantizer.revision();
        if revision != self.cached_revision {
            self.cached_revision = revision;
            if self.gate_high && self.note_active {
                let requantized = self.quantizer.snap(self.raw_pitch) + self.detune;
                if requantized != self.out_pitch {
                    self.out_pitch = requantized;
                    self.cycle.new_note = true;
                }
            }
        }

        if self.gate_high {
            self.gate_timer -= inputs.dt;
            if self.gate_timer <= 0.0 {
                self.gate_timer = 0.0;
                self.gate_high = false;
            }
        }

        if inputs.run_toggle {
            self.running = !self.running;
        }
        if inputs.reseed_trigger {
            let fresh = self.rng.next_u64();
            self.reset(fresh);
            self.cycle.reseed_edge = true;
        }
        if inputs.reset_edge {
            self.restart();
            self.cycle.reset_edge = true;
        }

        let timing = step_timing(controls.rate_knob);
        if self.clock.set_connected(inputs.external_clock_connected) {
            self.phase = 0.0;
            self.pending_substeps = 0;
            self.edges_until_step = 1;
        }

        if self.running {
            if !self.seeded {
                self.reset(FIRST_USE_SEED);
            }

            if self.clock.connected() {
                self.clock.advance(inputs.dt);
                if inputs.clock_edge {
                    self.cycle.clock_edge = true;
                    let period = self.clock.on_edge();
                    match timing {
                        StepTiming::DivideEdges { edges_per_step } => {
                            if self.edges_until_step <= 1 {
                                let base = period * edges_per_step as f32;
                                self.advance_step(&controls, base);
                                self.edges_until_step = edges_per_step;
                            } else {
                                self.edges_until_step -= 1;
                            }
                        }
                        StepTiming::MultiplyEdges { steps_per_edge } => {
                            self.substep_duration =
                                (period / steps_per_edge as f32).max(MIN_DURATION);
                            self.phase = 0.0;
                            self.pending_substeps = steps_per_edge - 1;
                            self.advance_step(&controls, self.substep_duration);
                        }
                    }
                } else if self.pending_substeps > 0 {
                    // Catch-up loop, not a single if: jitter must not drop
                    // subdivided steps.
                    self.phase += inputs.dt;
                    while self.pending_substeps > 0 && self.phase >= self.substep_duration {
                        self.phase -= self.substep_duration;
                        self.pending_substeps -= 1;
                        self.advance_step(&controls, self.substep_duration);
                    }
                }
            } else {
                let base = (1.0 / knob_to_hz(controls.rate_knob)).max(MIN_DURATION);
                self.phase += inputs.dt;
                while self.phase >= self.step_duration {
                    self.phase -= self.step_duration;
                    self.advance_step(&controls, base);
                }
            }
        }

        CycleOutputs {
            pitch: self.out_pitch,
            gate: self.gate_high,
            velocity: self.out_vel,
            end_of_cycle: self.cycle.end_of_cycle,
            new_note: self.cycle.new_note,
            steps_advanced: self.cycle.steps_advanced,
        }
    }

    /// Swing lengthens odd-indexed steps by the swing fraction.
    fn swing_duration(base: f32, index: usize, swing: f32) -> f32 {
        if index % 2 == 1 {
            (base * (1.0 + swing)).max(MIN_DURATION)
        } else {
            base.max(MIN_DURATION)
        }
    }

    fn resolve_index(&mut self, controls: &Controls) -> usize {
        let steps = controls.steps as usize;
        if self.restart_pending {
            self.restart_pending = false;
            self.play_counter = 0;
            self.pong_position = 0;
            self.pong_descending = false;
        } else {
            match controls.direction {
                Direction::Forward | Direction::Reverse => {
                    self.play_counter += 1;
                    if self.play_counter >= steps {
                        self.play_counter = 0;
                        self.cycle.end_of_cycle = true;
                    }
                }
                Direction::PingPong => {
                    if steps == 1 {
                        self.cycle.end_of_cycle = true;
                    } else if self.pong_descending {
                        self.pong_position = self.pong_position.saturating_sub(1);
                        if self.pong_position == 0 {
                            self.pong_descending = false;
                            self.cycle.end_of_cycle = true;
                        }
                    } else {
                        self.pong_position += 1;
                        if self.pong_position >= steps - 1 {
                            self.pong_position = steps - 1;
                            self.pong_descending = true;
                            self.cycle.end_of_cycle = true;
                        }
                    }
                }
                Direction::Random => {
                    // Retry a few draws to dodge immediate repeats of the
                    // emitted index, so the rotation offset must be applied
                    // before comparing. A repeat after 8 tries is accepted.
                    let offset = controls.offset as usize;
                    let mut pick = self.rng.next_below(steps as u32) as usize;
                    for _ in 0..8 {
                        if steps == 1 || (pick + offset) % steps != self.current_step {
                            break;
                        }
                        pick = self.rng.next_below(steps as u32) as usize;
                    }
                    self.play_counter = pick;
                }
            }
        }

        let raw = match controls.direction {
            Direction::Forward | Direction::Random => self.play_counter,
            Direction::Reverse => steps - 1 - self.play_counter,
            Direction::PingPong => self.pong_position,
        };
        (raw + controls.offset as usize) % steps
    }

    fn advance_step(&mut self, controls: &Controls, base_duration: f32) {
        let index = self.resolve_index(controls);
        self.current_step = index;
        self.cycle.steps_advanced += 1;

        let duration = Self::swing_duration(base_duration, index, controls.swing);
        self.step_duration = duration;

        let event = {
            let mut ctx = AlgoContext {
                step_index: index,
                step_count: controls.steps as usize,
                density: controls.density,
                accent: controls.accent,
                last_pitch: self.out_pitch,
                last_vel: self.out_vel,
                clock_hz: 1.0 / base_duration.max(MIN_DURATION),
                rng: &mut self.rng,
            };
            self.algorithm.generate(&mut ctx)
        };

        let fires = event.active && self.rng.chance(event.prob);
        if fires {
            self.raw_pitch = event.pitch;
            self.detune = event.detune;
            let pitch = self.quantizer.snap(event.pitch) + event.detune;

            let fresh = !self.gate_high || pitch != self.out_pitch;
            if fresh {
                self.cycle.new_note = true;
            }

            self.out_pitch = pitch;
            self.out_vel = event.vel.clamp(0.0, 1.0);
            self.gate_high = true;
            let gate_frac = event.gate_frac.clamp(0.01, 1.0);
            self.gate_timer = duration * gate_frac * controls.gate_percent;
            self.note_active = true;

            self.history.push(StepOutcome {
                step_index: index as u8,
                pitch,
                gate: true,
                new_note: fresh,
            });
        } else {
            // Silent step: a sustained gate keeps running on its timer, and
            // the ringing note stays eligible for re-voicing until it closes.
            if !self.gate_high {
                self.note_active = false;
            }
            self.history.push(StepOutcome {
                step_index: index as u8,
                pitch: self.out_pitch,
                gate: false,
                new_note: false,
            });
        }
    }

    /// Fill the producer half of the master→expander bus from this cycle's
    /// state. Call after [`SequencerCore::process`], before the host flips
    /// the buffers.
    pub fn populate_master_message(&self, msg: &mut MasterToExpander) {
        msg.magic = crate::bus::BUS_MAGIC;
        msg.version = crate::bus::BUS_VERSION;
        msg.running = self.running;
        msg.steps = self.controls.steps.min(16) as u8;
        msg.current_step = (self.current_step % 16) as u8 + 1;
        msg.reset_edge = self.cycle.reset_edge;
        msg.clock_edge = self.cycle.clock_edge;
        msg.end_of_cycle = self.cycle.end_of_cycle;
        msg.reseed_edge = self.cycle.reseed_edge;
        msg.steps_advanced = self.cycle.steps_advanced.min(u8::MAX as u32) as u8;
        msg.pitch = self.out_pitch;
        msg.gate = self.gate_high;
        msg.new_note = self.cycle.new_note;
        msg.gate_percent = self.controls.gate_percent;

        // Clear validity first, then keep the most recent occurrence of each
        // step index; newest-first iteration makes first-write-wins correct.
        msg.clear_history();
        for outcome in self.history.iter_recent() {
            let slot = &mut msg.history[outcome.step_index as usize % MASTER_HISTORY_SLOTS];
            if !slot.valid {
                *slot = HistorySlot {
                    pitch: outcome.pitch,
                    gate: outcome.gate,
                    new_note: outcome.new_note,
                    valid: true,
                };
            }
        }
    }

    /// The expander's override for the current step, if a valid expander
    /// message is present. Invalid messages read as "no expander".
    pub fn expander_override(&self, msg: &ExpanderToMaster) -> Option<ExpanderStep> {
        if !msg.is_valid() {
            return None;
        }
        msg.slots.get(self.current_step % msg.slots.len()).copied()
    }
}
