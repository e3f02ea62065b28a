//! Musical pitch quantizer with live-revision tracking.
//!
//! Snaps arbitrary volt-per-octave pitches onto a selectable scale, offset by
//! root and transpose voltages. Every observable state change bumps a
//! monotonic revision counter; dependents compare revisions instead of
//! polling every field, which is how the sequencer re-voices a sustained note
//! the moment the scale changes under it.

/// A named set of allowed semitone intervals above the root.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub name: &'static str,
    pub intervals: &'static [u8],
}

/// Fixed scale table. Indexed by the host's scale control; out-of-range
/// indices clamp to the last entry.
pub const SCALES: &[Scale] = &[
    Scale {
        name: "Chromatic",
        intervals: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    Scale {
        name: "Major",
        intervals: &[0, 2, 4, 5, 7, 9, 11],
    },
    Scale {
        name: "Natural Minor",
        intervals: &[0, 2, 3, 5, 7, 8, 10],
    },
    Scale {
        name: "Harmonic Minor",
        intervals: &[0, 2, 3, 5, 7, 8, 11],
    },
    Scale {
        name: "Dorian",
        intervals: &[0, 2, 3, 5, 7, 9, 10],
    },
    Scale {
        name: "Phrygian",
        intervals: &[0, 1, 3, 5, 7, 8, 10],
    },
    Scale {
        name: "Lydian",
        intervals: &[0, 2, 4, 6, 7, 9, 11],
    },
    Scale {
        name: "Mixolydian",
        intervals: &[0, 2, 4, 5, 7, 9, 10],
    },
    Scale {
        name: "Pentatonic Major",
        intervals: &[0, 2, 4, 7, 9],
    },
    Scale {
        name: "Pentatonic Minor",
        intervals: &[0, 3, 5, 7, 10],
    },
    Scale {
        name: "Blues",
        intervals: &[0, 3, 5, 6, 7, 10],
    },
    Scale {
        name: "Whole Tone",
        intervals: &[0, 2, 4, 6, 8, 10],
    },
];

/// Scale quantizer. One instance per sequencer, mutated by host-forwarded
/// parameters every processing cycle, never destroyed mid-session.
#[derive(Debug, Clone)]
pub struct Quantizer {
    scale_index: usize,
    root: f32,
    transpose: f32,
    allowed: [bool; 12],
    revision: u64,
}

impl Quantizer {
    pub fn new() -> Self {
        let mut q = Self {
            scale_index: 0,
            root: 0.0,
            transpose: 0.0,
            allowed: [false; 12],
            revision: 0,
        };
        q.rebuild_allowed();
        q
    }

    /// Select a scale by table index. Out-of-range indices clamp; an actual
    /// change bumps the revision.
    pub fn set_scale(&mut self, index: usize) {
        let index = index.min(SCALES.len() - 1);
        if index != self.scale_index {
            self.scale_index = index;
            self.rebuild_allowed();
            self.revision += 1;
        }
    }

    /// Root offset in volts. A change bumps the revision.
    pub fn set_root(&mut self, volts: f32) {
        if volts != self.root {
            self.root = volts;
            self.revision += 1;
        }
    }

    /// Transpose offset in volts. A change bumps the revision.
    pub fn set_transpose(&mut self, volts: f32) {
        if volts != self.transpose {
            self.transpose = volts;
            self.revision += 1;
        }
    }

    pub fn scale_index(&self) -> usize {
        self.scale_index
    }

    pub fn root(&self) -> f32 {
        self.root
    }

    pub fn transpose(&self) -> f32 {
        self.transpose
    }

    /// Monotonic change counter. This is the only staleness signal
    /// dependents get; it is never recomputed implicitly elsewhere.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn rebuild_allowed(&mut self) {
        self.allowed = [false; 12];
        for &i in SCALES[self.scale_index].intervals {
            if i < 12 {
                self.allowed[i as usize] = true;
            }
        }
        // A scale with no usable intervals cannot be selected through the
        // table above, but an empty allowed set would make the degree search
        // spin, so fall back to full chromatic.
        if self.allowed.iter().all(|&a| !a) {
            self.allowed = [true; 12];
        }
    }

    /// Snap a volt-per-octave pitch onto the scale and apply the transpose.
    ///
    /// The offset is measured from `root + transpose` so that snapping is
    /// idempotent for every root/transpose combination: a value that already
    /// sits on the shifted lattice round-trips unchanged.
    pub fn snap(&self, volts: f32) -> f32 {
        let base = self.root + self.transpose;
        let semis = ((volts - base) * 12.0).round() as i32;
        let octave = semis.div_euclid(12);
        let degree = semis.rem_euclid(12) as usize;

        let snapped = octave * 12 + self.nearest_allowed_degree(degree);
        base + snapped as f32 / 12.0
    }

    /// Signed semitone offset of the nearest allowed degree. Searches outward
    /// symmetrically, trying up before down at each radius, testing each
    /// degree exactly once; terminates within 12 iterations because at least
    /// one degree is always allowed.
    fn nearest_allowed_degree(&self, degree: usize) -> i32 {
        let degree = degree as i32;
        for radius in 0..12 {
            let up = degree + radius;
            if self.allowed[up.rem_euclid(12) as usize] {
                return up;
            }
            if radius > 0 {
                let down = degree - radius;
                if self.allowed[down.rem_euclid(12) as usize] {
                    return down;
                }
            }
        }
        degree
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new()
    }
}
