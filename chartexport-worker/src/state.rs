//! Worker lifecycle state shared between a request and its watchdog

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Observable state of a worker, as seen by the owning pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Ready to accept a job
    Idle = 0,
    /// Exactly one job is in flight
    Busy = 1,
    /// The last job overran its budget; the worker may be wedged
    TimedOut = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Busy,
            _ => WorkerState::TimedOut,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "IDLE"),
            WorkerState::Busy => write!(f, "BUSY"),
            WorkerState::TimedOut => write!(f, "TIMEDOUT"),
        }
    }
}

/// Atomic cell holding a [`WorkerState`]
///
/// Written by the request path and by the watchdog task. All accesses are
/// `SeqCst` so transitions are observed in a single order.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Store `new` only if the cell still holds `current`
    pub fn transition(&self, current: WorkerState, new: WorkerState) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(WorkerState::Idle)
    }
}
