//! Status observers.
//!
//! The scheduler calls an [`Observer`] synchronously on every state change,
//! so implementations must return quickly.

use crate::target::{TargetState, TargetStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Receives target status changes during a run.
pub trait Observer: Send + Sync {
    /// A target entered a new state.
    fn on_state_change(&self, status: &TargetStatus);

    /// A running target printed a new line.
    fn on_output(&self, _status: &TargetStatus) {}

    /// Every target is terminal.
    fn stop(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_state_change(&self, _status: &TargetStatus) {}
}

/// A recorded state change.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Target name
    pub name: String,
    /// State entered
    pub state: TargetState,
    /// When it was entered
    pub at: Instant,
}

/// Observer that keeps every transition in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    transitions: Mutex<Vec<Transition>>,
    outputs: Mutex<Vec<(String, String)>>,
    stopped: AtomicBool,
}

impl Recorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All transitions in the order they happened.
    #[must_use]
    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// States one target went through.
    #[must_use]
    pub fn states_of(&self, name: &str) -> Vec<TargetState> {
        self.transitions()
            .into_iter()
            .filter(|t| t.name == name)
            .map(|t| t.state)
            .collect()
    }

    /// Position in the transition log where `name` first entered `state`.
    #[must_use]
    pub fn position(&self, name: &str, state: TargetState) -> Option<usize> {
        self.transitions()
            .iter()
            .position(|t| t.name == name && t.state == state)
    }

    /// Output lines seen for a target.
    #[must_use]
    pub fn lines_of(&self, name: &str) -> Vec<String> {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(target, _)| target == name)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Whether [`Observer::stop`] was called.
    #[must_use]
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Observer for Recorder {
    fn on_state_change(&self, status: &TargetStatus) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Transition {
                name: status.name.clone(),
                state: status.state,
                at: Instant::now(),
            });
    }

    fn on_output(&self, status: &TargetStatus) {
        if let Some(line) = &status.last_line {
            self.outputs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((status.name.clone(), line.clone()));
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
