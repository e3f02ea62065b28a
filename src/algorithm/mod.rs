//! Generative step algorithms: the contract every generator implements, the
//! context snapshot it receives, and the registry a host uses to pick one.
//!
//! An [`Algorithm`] is a stateful box selected at runtime. The sequencer core
//! calls [`Algorithm::generate`] exactly once per step advance with an
//! [`AlgoContext`] snapshot; everything random the algorithm does must route
//! through the context's shared [`Rng`], or seed replay breaks.

use crate::rng::Rng;

pub mod euclid;
pub mod hypnotic;
pub mod sting;
pub mod walk;

pub use euclid::{euclid_hit, EuclidAccent, EuclidPulse};
pub use hypnotic::{Hypnotic, HypnoticEvolve};
pub use sting::{StingEuclid, StingPattern};
pub use walk::{AcidWalk, CenterDrift, RandomWalk};

/// One volt per octave, so a semitone is a twelfth of a volt.
pub const SEMITONE: f32 = 1.0 / 12.0;

/// Transient output of one algorithm invocation. Created fresh each step and
/// consumed immediately by the core; never retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    /// Whether this step wants to sound at all.
    pub active: bool,
    /// Pitch in volts, pre-quantization.
    pub pitch: f32,
    /// Post-hoc activation probability in `[0, 1]`; the core rolls this after
    /// `generate` returns, from the same shared RNG.
    pub prob: f32,
    /// Velocity in `[0, 1]`.
    pub vel: f32,
    /// Fraction of the step duration the gate stays high, in `(0, 1]`.
    pub gate_frac: f32,
    /// Volts added *after* quantization, deliberately bypassing the scale
    /// snap. Used for microtonal tension, not vibrato.
    pub detune: f32,
}

impl StepEvent {
    /// A silent step.
    pub fn rest() -> Self {
        Self {
            active: false,
            pitch: 0.0,
            prob: 0.0,
            vel: 0.0,
            gate_frac: 0.5,
            detune: 0.0,
        }
    }
}

impl Default for StepEvent {
    fn default() -> Self {
        Self::rest()
    }
}

/// Read-only snapshot handed to an algorithm for one step, plus a mutable
/// borrow of the core's RNG. Identical context and RNG state must always
/// yield an identical [`StepEvent`].
pub struct AlgoContext<'a> {
    /// Resolved step index in `[0, step_count)`.
    pub step_index: usize,
    /// Current sequence length.
    pub step_count: usize,
    /// Note density control, `[0, 1]`.
    pub density: f32,
    /// Accent amount control, `[0, 1]`.
    pub accent: f32,
    /// Pitch the core last emitted, in volts.
    pub last_pitch: f32,
    /// Velocity the core last emitted.
    pub last_vel: f32,
    /// Current step rate estimate in Hz.
    pub clock_hz: f32,
    /// The core-owned generator. The core persists the post-call state.
    pub rng: &'a mut Rng,
}

/// Contract for a generative step algorithm.
///
/// One instance lives per sequencer for as long as it is selected, and is
/// destroyed on algorithm switch. `reset` must fully reinitialize internal
/// state from the seed; `generate` is called once per step advance.
pub trait Algorithm: Send {
    fn reset(&mut self, seed: u64);

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent;
}

/// Allow boxed algorithms to be used directly (for dynamic dispatch).
impl Algorithm for Box<dyn Algorithm> {
    fn reset(&mut self, seed: u64) {
        (**self).reset(seed)
    }

    fn generate(&mut self, ctx: &mut AlgoContext) -> StepEvent {
        (**self).generate(ctx)
    }
}

/// Factory signature stored in the registry.
pub type AlgorithmFactory = fn() -> Box<dyn Algorithm>;

struct RegistryEntry {
    id: String,
    display: String,
    factory: AlgorithmFactory,
}

/// Insertion-ordered mapping from string id to algorithm factory.
///
/// Registration is idempotent: a duplicate id is silently ignored. Unknown
/// ids fail soft; the core falls back to [`AlgorithmRegistry::default_id`].
/// Built once by the composition root, never mutated from the audio thread.
pub struct AlgorithmRegistry {
    entries: Vec<RegistryEntry>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the nine built-in generators in their stable UI order.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register_named("walk", "Random Walk", || Box::new(RandomWalk::new()));
        r.register_named("drift", "Center Drift", || Box::new(CenterDrift::new()));
        r.register_named("acid", "Acid Walk", || Box::new(AcidWalk::new()));
        r.register_named("sting", "Sting", || Box::new(StingPattern::new()));
        r.register_named("sting-euclid", "Sting Euclid", || {
            Box::new(StingEuclid::new())
        });
        r.register_named("euclid", "Euclid", || Box::new(EuclidPulse::new()));
        r.register_named("euclid-accent", "Euclid Accent", || {
            Box::new(EuclidAccent::new())
        });
        r.register_named("hypnotic", "Hypnotic", || Box::new(Hypnotic::new()));
        r.register_named("hypnotic-evolve", "Hypnotic Evolve", || {
            Box::new(HypnoticEvolve::new())
        });
        r
    }

    /// Register a factory under `id`, with the id doubling as display name.
    pub fn register(&mut self, id: &str, factory: AlgorithmFactory) {
        self.register_named(id, id, factory);
    }

    /// Register a factory with a separate display name. Duplicate ids are
    /// ignored so a host may re-run its registration on reload.
    pub fn register_named(&mut self, id: &str, display: &str, factory: AlgorithmFactory) {
        if self.entries.iter().any(|e| e.id == id) {
            return;
        }
        self.entries.push(RegistryEntry {
            id: id.to_string(),
            display: display.to_string(),
            factory,
        });
    }

    /// Instantiate the algorithm registered under `id`, if any.
    pub fn create(&self, id: &str) -> Option<Box<dyn Algorithm>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.factory)())
    }

    /// Instantiate `id`, or the default entry when `id` is unknown.
    pub fn create_or_default(&self, id: &str) -> Option<(&str, Box<dyn Algorithm>)> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .or_else(|| self.entries.first())?;
        Some((entry.id.as_str(), (entry.factory)()))
    }

    /// Registered ids in insertion order, stable for UI indexing.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Human-readable name for `id`; falls back to `id` itself when unknown.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.display.as_str())
            .unwrap_or(id)
    }

    /// The fallback id: first registered entry, if any.
    pub fn default_id(&self) -> Option<&str> {
        self.entries.first().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_keep_insertion_order() {
        let r = AlgorithmRegistry::with_builtins();
        let ids: Vec<&str> = r.ids().collect();
        assert_eq!(
            ids,
            vec![
                "walk",
                "drift",
                "acid",
                "sting",
                "sting-euclid",
                "euclid",
                "euclid-accent",
                "hypnotic",
                "hypnotic-evolve",
            ]
        );
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut r = AlgorithmRegistry::new();
        r.register_named("walk", "First", || Box::new(RandomWalk::new()));
        r.register_named("walk", "Second", || Box::new(AcidWalk::new()));
        assert_eq!(r.len(), 1);
        assert_eq!(r.display_name("walk"), "First");
    }

    #[test]
    fn unknown_id_falls_back_to_first_entry() {
        let r = AlgorithmRegistry::with_builtins();
        let (id, _algo) = r.create_or_default("does-not-exist").unwrap();
        assert_eq!(id, "walk");
        assert!(r.create("does-not-exist").is_none());
    }

    #[test]
    fn display_name_defaults_to_id() {
        let r = AlgorithmRegistry::with_builtins();
        assert_eq!(r.display_name("acid"), "Acid Walk");
        assert_eq!(r.display_name("mystery"), "mystery");
    }

    #[test]
    fn empty_registry_has_no_default() {
        let r = AlgorithmRegistry::new();
        assert!(r.default_id().is_none());
        assert!(r.create_or_default("walk").is_none());
    }
}
