// State shared between the application task and the transfer task.
//
// One `Pipeline` per panel, usually a `static`. The Display (app side)
// and the TransferEngine (worker side) both borrow it; neither holds a
// pointer to the other.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::completion::Completion;
use super::stats::{StatsCell, TransferStats};
use crate::drivers::transfer::Message;
use crate::framebuffer::{BufferState, FRAME_COUNT, FrameStore};

/// Depth of the job FIFO. Must be at least twice the strip count.
pub const JOB_QUEUE_DEPTH: usize = 32;

pub type JobQueue = Channel<CriticalSectionRawMutex, Message, JOB_QUEUE_DEPTH>;

/// Where the transfer task is in its per-job state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Plan = 1,
    Copy = 2,
    Transmit = 3,
    Done = 4,
}

impl EngineState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Plan,
            2 => EngineState::Copy,
            3 => EngineState::Transmit,
            4 => EngineState::Done,
            _ => EngineState::Idle,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Plan => write!(f, "plan"),
            EngineState::Copy => write!(f, "copy"),
            EngineState::Transmit => write!(f, "transmit"),
            EngineState::Done => write!(f, "done"),
        }
    }
}

pub struct Pipeline {
    pub(crate) store: FrameStore,
    pub(crate) jobs: JobQueue,
    pub(crate) completion: Completion,
    pub(crate) stats: StatsCell,
    /// Fired by the transfer task right before it hands the panel back.
    pub(crate) stopped: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) claimed: AtomicBool,
    engine_state: AtomicU8,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub const fn new() -> Self {
        Self {
            store: FrameStore::new(),
            jobs: Channel::new(),
            completion: Completion::new(),
            stats: StatsCell::new(),
            stopped: Signal::new(),
            claimed: AtomicBool::new(false),
            engine_state: AtomicU8::new(EngineState::Idle as u8),
        }
    }

    pub fn stats(&self) -> TransferStats {
        self.stats.get()
    }

    pub fn buffer_states(&self) -> [Option<BufferState>; FRAME_COUNT] {
        self.store.states()
    }

    pub fn engine_state(&self) -> EngineState {
        EngineState::from_u8(self.engine_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_engine_state(&self, state: EngineState) {
        self.engine_state.store(state as u8, Ordering::Release);
    }

    /// Fresh start for begin(): empty queue, idle completion, zeroed stats.
    pub(crate) fn reset(&self) {
        self.jobs.clear();
        self.completion.reset();
        self.stats.reset();
        self.stopped.reset();
        self.set_engine_state(EngineState::Idle);
    }
}
