//! Control messages delivered into the audio thread from elsewhere (UI,
//! host automation). The realtime side only ever pops; the queue is a
//! lock-free SPSC ring when the `rtrb` feature is on.

#[cfg(feature = "rtrb")]
use rtrb::Consumer;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ControlMessage {
    SetRunning(bool),
    ToggleRun,
    /// Rewind to step 0 and replay the current seed from the top.
    Restart,
    /// Re-seed and regenerate everything.
    Reseed(u64),
    /// Switch algorithm by registry position (hosts resolve ids up front so
    /// no strings cross into the audio thread).
    SelectAlgorithm(usize),
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<ControlMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<ControlMessage> {
    fn pop(&mut self) -> Option<ControlMessage> {
        Consumer::pop(self).ok()
    }
}

/// A receiver that never yields anything, for standalone operation.
pub struct NoMessages;

impl MessageReceiver for NoMessages {
    fn pop(&mut self) -> Option<ControlMessage> {
        None
    }
}
