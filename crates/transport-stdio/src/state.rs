use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Starting,
    Running,
    Stopping,
    Crashed,
    Failed,
}

impl From<u8> for ProcessState {
    fn from(v: u8) -> Self {
        match v {
            1 => ProcessState::Starting,
            2 => ProcessState::Running,
            3 => ProcessState::Stopping,
            4 => ProcessState::Crashed,
            5 => ProcessState::Failed,
            _ => ProcessState::Idle,
        }
    }
}

impl From<ProcessState> for u8 {
    fn from(s: ProcessState) -> Self {
        match s {
            ProcessState::Idle => 0,
            ProcessState::Starting => 1,
            ProcessState::Running => 2,
            ProcessState::Stopping => 3,
            ProcessState::Crashed => 4,
            ProcessState::Failed => 5,
        }
    }
}

pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: ProcessState) -> Self {
        Self(AtomicU8::new(initial.into()))
    }

    pub fn get(&self) -> ProcessState {
        ProcessState::from(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ProcessState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Transitions to `to` only if currently `from`; returns whether it happened.
    pub fn transition(&self, from: ProcessState, to: ProcessState) -> bool {
        self.0
            .compare_exchange(from.into(), to.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
