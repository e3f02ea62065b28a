//! Inter-module message bus.
//!
//! Cooperating modules exchange fixed-layout snapshots once per processing
//! cycle through a host-owned double buffer: each side writes only its
//! producer half, and the host flips producer/consumer roles between cycles.
//! Nothing here locks; correctness rests on the single-writer discipline.
//!
//! Every message starts with a magic constant and a version byte. A consumer
//! that sees either mismatch treats the message exactly like an absent
//! expander: silent degradation, never an error.

use byteorder::{ByteOrder, LittleEndian};

pub const BUS_MAGIC: u32 = 0x4753_5142;
pub const BUS_VERSION: u8 = 2;

/// History slots carried on the master→expander bus.
pub const MASTER_HISTORY_SLOTS: usize = 8;

/// Per-step slots on the expander→master and modulation buses.
pub const STEP_SLOTS: usize = 16;

/// Per-step gate interpretation requested by an expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    /// Follow the master's gate unchanged.
    #[default]
    Expand = 0,
    /// Silence this step.
    Mute = 1,
    /// Replace the gate with a short trigger.
    Trigger = 2,
}

impl GateMode {
    /// Out-of-range values clamp to the default rather than failing.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => GateMode::Mute,
            2 => GateMode::Trigger,
            _ => GateMode::Expand,
        }
    }
}

/// One step-history entry on the master→expander bus. `valid` marks whether
/// the producer could account for this slot this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistorySlot {
    pub pitch: f32,
    pub gate: bool,
    pub new_note: bool,
    pub valid: bool,
}

/// Snapshot a master sequencer publishes for its expander each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterToExpander {
    pub magic: u32,
    pub version: u8,
    pub running: bool,
    /// Active step count, 1..=16 as seen by the expander.
    pub steps: u8,
    /// 1-based current step index.
    pub current_step: u8,
    pub reset_edge: bool,
    pub clock_edge: bool,
    pub end_of_cycle: bool,
    pub reseed_edge: bool,
    /// Steps fired within this host callback; lets the consumer catch up
    /// when clock multiplication packs several steps into one frame.
    pub steps_advanced: u8,
    pub pitch: f32,
    pub gate: bool,
    pub new_note: bool,
    pub gate_percent: f32,
    /// Indexed by `step % MASTER_HISTORY_SLOTS`. The producer clears all
    /// `valid` flags each cycle and repopulates only slots it can account
    /// for, keeping the most recently written occurrence of each index.
    pub history: [HistorySlot; MASTER_HISTORY_SLOTS],
}

impl MasterToExpander {
    pub const WIRE_SIZE: usize = 4 + 1 + 8 + 4 + 1 + 1 + 4 + MASTER_HISTORY_SLOTS * 7;

    pub fn new() -> Self {
        Self {
            magic: BUS_MAGIC,
            version: BUS_VERSION,
            running: false,
            steps: 1,
            current_step: 1,
            reset_edge: false,
            clock_edge: false,
            end_of_cycle: false,
            reseed_edge: false,
            steps_advanced: 0,
            pitch: 0.0,
            gate: false,
            new_note: false,
            gate_percent: 1.0,
            history: [HistorySlot::default(); MASTER_HISTORY_SLOTS],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == BUS_MAGIC && self.version == BUS_VERSION
    }

    /// Producer-side per-cycle reset of the history validity flags.
    pub fn clear_history(&mut self) {
        for slot in &mut self.history {
            slot.valid = false;
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::WIRE_SIZE);
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        buf[4] = self.version;
        buf[5] = self.running as u8;
        buf[6] = self.steps;
        buf[7] = self.current_step;
        buf[8] = self.reset_edge as u8;
        buf[9] = self.clock_edge as u8;
        buf[10] = self.end_of_cycle as u8;
        buf[11] = self.reseed_edge as u8;
        buf[12] = self.steps_advanced;
        LittleEndian::write_f32(&mut buf[13..17], self.pitch);
        buf[17] = self.gate as u8;
        buf[18] = self.new_note as u8;
        LittleEndian::write_f32(&mut buf[19..23], self.gate_percent);
        let mut at = 23;
        for slot in &self.history {
            LittleEndian::write_f32(&mut buf[at..at + 4], slot.pitch);
            buf[at + 4] = slot.gate as u8;
            buf[at + 5] = slot.new_note as u8;
            buf[at + 6] = slot.valid as u8;
            at += 7;
        }
    }

    /// Decode and validate. `None` means "no expander attached".
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::WIRE_SIZE {
            return None;
        }
        let magic = LittleEndian::read_u32(&buf[0..4]);
        let version = buf[4];
        if magic != BUS_MAGIC || version != BUS_VERSION {
            return None;
        }
        let mut msg = Self::new();
        msg.running = buf[5] != 0;
        msg.steps = buf[6];
        msg.current_step = buf[7];
        msg.reset_edge = buf[8] != 0;
        msg.clock_edge = buf[9] != 0;
        msg.end_of_cycle = buf[10] != 0;
        msg.reseed_edge = buf[11] != 0;
        msg.steps_advanced = buf[12];
        msg.pitch = LittleEndian::read_f32(&buf[13..17]);
        msg.gate = buf[17] != 0;
        msg.new_note = buf[18] != 0;
        msg.gate_percent = LittleEndian::read_f32(&buf[19..23]);
        let mut at = 23;
        for slot in &mut msg.history {
            slot.pitch = LittleEndian::read_f32(&buf[at..at + 4]);
            slot.gate = buf[at + 4] != 0;
            slot.new_note = buf[at + 5] != 0;
            slot.valid = buf[at + 6] != 0;
            at += 7;
        }
        Some(msg)
    }
}

impl Default for MasterToExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-step override an expander sends back to its master.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpanderStep {
    pub mode: GateMode,
    pub cv: f32,
}

/// Expander→master reply: one override slot per step.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpanderToMaster {
    pub magic: u32,
    pub version: u8,
    pub slots: [ExpanderStep; STEP_SLOTS],
}

impl ExpanderToMaster {
    pub const WIRE_SIZE: usize = 4 + 1 + STEP_SLOTS * 5;

    pub fn new() -> Self {
        Self {
            magic: BUS_MAGIC,
            version: BUS_VERSION,
            slots: [ExpanderStep::default(); STEP_SLOTS],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == BUS_MAGIC && self.version == BUS_VERSION
    }

    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::WIRE_SIZE);
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        buf[4] = self.version;
        let mut at = 5;
        for slot in &self.slots {
            buf[at] = slot.mode as u8;
            LittleEndian::write_f32(&mut buf[at + 1..at + 5], slot.cv);
            at += 5;
        }
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::WIRE_SIZE {
            return None;
        }
        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != BUS_MAGIC || buf[4] != BUS_VERSION {
            return None;
        }
        let mut msg = Self::new();
        let mut at = 5;
        for slot in &mut msg.slots {
            slot.mode = GateMode::from_u8(buf[at]);
            slot.cv = LittleEndian::read_f32(&buf[at + 1..at + 5]);
            at += 5;
        }
        Some(msg)
    }
}

impl Default for ExpanderToMaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Sibling bus for the modulation module pair: per-step CV and mode scale
/// arrays plus a connectivity flag. `active_steps` bounds which slots the
/// consumer should honor.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulationMessage {
    pub magic: u32,
    pub version: u8,
    pub connected: bool,
    pub active_steps: u8,
    pub cv_scale: [f32; STEP_SLOTS],
    pub mode_scale: [f32; STEP_SLOTS],
}

impl ModulationMessage {
    pub const WIRE_SIZE: usize = 4 + 1 + 1 + 1 + STEP_SLOTS * 8;

    pub fn new() -> Self {
        Self {
            magic: BUS_MAGIC,
            version: BUS_VERSION,
            connected: false,
            active_steps: STEP_SLOTS as u8,
            cv_scale: [1.0; STEP_SLOTS],
            mode_scale: [1.0; STEP_SLOTS],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == BUS_MAGIC && self.version == BUS_VERSION
    }

    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::WIRE_SIZE);
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        buf[4] = self.version;
        buf[5] = self.connected as u8;
        buf[6] = self.active_steps;
        let mut at = 7;
        for &cv in &self.cv_scale {
            LittleEndian::write_f32(&mut buf[at..at + 4], cv);
            at += 4;
        }
        for &mode in &self.mode_scale {
            LittleEndian::write_f32(&mut buf[at..at + 4], mode);
            at += 4;
        }
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::WIRE_SIZE {
            return None;
        }
        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != BUS_MAGIC || buf[4] != BUS_VERSION {
            return None;
        }
        let mut msg = Self::new();
        msg.connected = buf[5] != 0;
        msg.active_steps = buf[6].min(STEP_SLOTS as u8);
        let mut at = 7;
        for cv in &mut msg.cv_scale {
            *cv = LittleEndian::read_f32(&buf[at..at + 4]);
            at += 4;
        }
        for mode in &mut msg.mode_scale {
            *mode = LittleEndian::read_f32(&buf[at..at + 4]);
            at += 4;
        }
        Some(msg)
    }
}

impl Default for ModulationMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer/consumer pair modeling the host's double-buffered message slot.
///
/// The producer writes only `producer_mut()` during a cycle and calls
/// [`DoubleBuffer::publish`] once at the end; the consumer's view stays
/// stable until then. One writer, ownership alternates by convention.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    buffers: [T; 2],
    producer: usize,
}

impl<T: Default> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self {
            buffers: [T::default(), T::default()],
            producer: 0,
        }
    }
}

impl<T> DoubleBuffer<T> {
    pub fn producer_mut(&mut self) -> &mut T {
        &mut self.buffers[self.producer]
    }

    pub fn consumer(&self) -> &T {
        &self.buffers[1 - self.producer]
    }

    /// Flip the buffers, making this cycle's message visible.
    pub fn publish(&mut self) {
        self.producer = 1 - self.producer;
    }
}

impl<T: Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
