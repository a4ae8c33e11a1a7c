use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a tracking worker.
///
/// Transitions only move forward:
/// `Uninitialized → Running → StopRequested → Stopped`, with
/// `Running → Stopped` allowed when the thread exits on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    Uninitialized = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::StopRequested,
            3 => WorkerState::Stopped,
            _ => WorkerState::Uninitialized,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, WorkerState::Running | WorkerState::StopRequested)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Running => "running",
            WorkerState::StopRequested => "stop requested",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Atomic cell holding a [`WorkerState`], shared by the worker thread and its handle.
#[derive(Debug)]
pub struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` only if that is a forward transition. Returns whether
    /// the state changed.
    pub fn advance(&self, next: WorkerState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if next as u8 <= current {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicWorkerState {
    fn default() -> Self {
        Self::new(WorkerState::Uninitialized)
    }
}
