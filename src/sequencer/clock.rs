//! External clock bookkeeping: inter-edge period measurement, lock
//! detection, and the division/multiplication split around the 2 Hz pivot.

/// The rate knob's center frequency. Requested step rates below the pivot
/// divide incoming edges; rates at or above it subdivide the measured period.
pub const PIVOT_HZ: f32 = 2.0;

/// Safe period substituted for degenerate (zero/negative) measurements.
pub const FALLBACK_PERIOD: f32 = 0.5;

/// Shortest period accepted as a real measurement, seconds.
const MIN_PERIOD: f32 = 1e-4;

/// Weight of the newest measurement in the period estimate.
const SMOOTHING: f32 = 0.25;

/// Free-running step rate for a rate knob value, `2^knob * 2 Hz`. The useful
/// knob range of -2..4 covers roughly 0.5–32 Hz.
#[inline]
pub fn knob_to_hz(rate_knob: f32) -> f32 {
    2.0_f32.powf(rate_knob) * PIVOT_HZ
}

/// How the core should advance steps against an external clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTiming {
    /// Consume several edges per internal step.
    DivideEdges { edges_per_step: u32 },
    /// Generate several internal steps per edge by subdividing the period.
    MultiplyEdges { steps_per_edge: u32 },
}

/// Resolve the rate knob into an external-clock timing mode.
///
/// The two sides of the pivot round differently: below 2 Hz the edge count
/// comes from the knob's octave distance (`ceil` of `log2`), above it from a
/// linear ratio (`round`). The mapping jumps exactly at the pivot; the knob
/// detents sit on whole octaves so the seam lands between positions.
pub fn step_timing(rate_knob: f32) -> StepTiming {
    let freq = knob_to_hz(rate_knob);
    if freq < PIVOT_HZ {
        let edges = (PIVOT_HZ / freq).log2().ceil() as u32;
        StepTiming::DivideEdges {
            edges_per_step: edges.max(1),
        }
    } else {
        StepTiming::MultiplyEdges {
            steps_per_edge: ((freq / PIVOT_HZ).round() as u32).max(1),
        }
    }
}

/// Measures the external clock and tracks whether we are locked to it.
///
/// Lock is considered lost once more than two measured periods elapse
/// without a new edge; output keeps running off the last estimate, only the
/// indicator degrades.
#[derive(Debug, Clone)]
pub struct ClockEngine {
    period: f32,
    time_since_edge: f32,
    edges_seen: u32,
    connected: bool,
}

impl ClockEngine {
    pub fn new() -> Self {
        Self {
            period: FALLBACK_PERIOD,
            time_since_edge: 0.0,
            edges_seen: 0,
            connected: false,
        }
    }

    /// Update connectivity. Returns true when it toggled, in which case the
    /// caller must resync its phase and division counters.
    pub fn set_connected(&mut self, connected: bool) -> bool {
        if connected == self.connected {
            return false;
        }
        self.connected = connected;
        self.time_since_edge = 0.0;
        self.edges_seen = 0;
        true
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Advance the edge timer by one cycle.
    pub fn advance(&mut self, dt: f32) {
        self.time_since_edge += dt;
    }

    /// Record an incoming edge and fold the measured interval into the
    /// period estimate. Returns the current estimate.
    pub fn on_edge(&mut self) -> f32 {
        let measured = self.time_since_edge;
        self.time_since_edge = 0.0;
        self.edges_seen = self.edges_seen.saturating_add(1);

        if measured > MIN_PERIOD {
            if self.edges_seen == 2 {
                // First full interval: take it as-is.
                self.period = measured;
            } else if self.edges_seen > 2 {
                self.period += SMOOTHING * (measured - self.period);
            }
        }
        self.period()
    }

    /// Smoothed inter-edge period; never zero or negative.
    pub fn period(&self) -> f32 {
        if self.period > MIN_PERIOD {
            self.period
        } else {
            FALLBACK_PERIOD
        }
    }

    /// True while edges keep arriving within two measured periods.
    pub fn locked(&self) -> bool {
        self.connected && self.edges_seen >= 2 && self.time_since_edge <= 2.0 * self.period()
    }
}

impl Default for ClockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_hz_request_divides_by_two_edges() {
        // 0.5 Hz is two octaves below the pivot.
        assert_eq!(
            step_timing(-2.0),
            StepTiming::DivideEdges { edges_per_step: 2 }
        );
    }

    #[test]
    fn pivot_and_above_multiply() {
        assert_eq!(
            step_timing(0.0),
            StepTiming::MultiplyEdges { steps_per_edge: 1 }
        );
        assert_eq!(
            step_timing(2.0),
            StepTiming::MultiplyEdges { steps_per_edge: 4 }
        );
        assert_eq!(
            step_timing(4.0),
            StepTiming::MultiplyEdges { steps_per_edge: 16 }
        );
    }

    #[test]
    fn period_estimate_follows_edges() {
        let mut clock = ClockEngine::new();
        clock.set_connected(true);
        clock.on_edge();
        for _ in 0..4 {
            for _ in 0..10 {
                clock.advance(0.01);
            }
            clock.on_edge();
        }
        assert!((clock.period() - 0.1).abs() < 1e-3);
        assert!(clock.locked());
    }

    #[test]
    fn lock_lost_after_two_silent_periods() {
        let mut clock = ClockEngine::new();
        clock.set_connected(true);
        clock.on_edge();
        for _ in 0..10 {
            clock.advance(0.01);
        }
        clock.on_edge();
        assert!(clock.locked());
        for _ in 0..25 {
            clock.advance(0.01);
        }
        assert!(!clock.locked());
    }

    #[test]
    fn connectivity_toggle_requests_resync() {
        let mut clock = ClockEngine::new();
        assert!(clock.set_connected(true));
        assert!(!clock.set_connected(true));
        assert!(clock.set_connected(false));
        assert!(!clock.locked());
    }

    #[test]
    fn degenerate_period_falls_back() {
        let clock = ClockEngine {
            period: 0.0,
            time_since_edge: 0.0,
            edges_seen: 5,
            connected: true,
        };
        assert_eq!(clock.period(), FALLBACK_PERIOD);
    }
}
