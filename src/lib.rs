pub mod algorithm; // Generative step algorithms and their registry
pub mod bus; // Fixed-layout expander message bus
pub mod quantizer;
pub mod rng;
pub mod sequencer; // Clocking, direction logic, step state machine
pub mod session;

/// Hard upper bound on sequence length. Step counts are clamped, never rejected.
pub const MAX_STEPS: usize = 64;

/// Capacity of the step-outcome history ring captured for expander modules.
pub const HISTORY_CAPACITY: usize = 16;
