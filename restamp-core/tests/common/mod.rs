//! Shared test doubles.

#![allow(dead_code)]

use restamp_core::{
    Command, CommandRunner, Engine, Invocation, LineSink, RunError, RunOptions, RunOutcome, StampStore,
    TargetSpec,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runner that records every call instead of spawning processes.
#[derive(Default)]
pub struct CountingRunner {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        let _ = self.failing.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| *call == name).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CommandRunner for CountingRunner {
    async fn run(
        &self,
        invocation: &Invocation<'_>,
        on_line: &LineSink<'_>,
    ) -> Result<RunOutcome, RunError> {
        self.calls.lock().unwrap().push(invocation.name.to_string());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.peak.fetch_max(running, Ordering::SeqCst);

        on_line(&format!("running {}", invocation.name));
        tokio::time::sleep(self.delay).await;

        let _ = self.running.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(invocation.name) {
            Ok(RunOutcome::Exited(1))
        } else {
            Ok(RunOutcome::Exited(0))
        }
    }
}

/// Shell target without sources.
pub fn target(name: &str, deps: &[&str]) -> TargetSpec {
    TargetSpec::new(name, Command::shell(format!("echo {name}")), ".").with_deps(deps.iter().copied())
}

/// Engine over a prepared stamp store.
pub fn engine(stamps: &StampStore, runner: &Arc<CountingRunner>, force: bool) -> Engine {
    stamps.prepare().unwrap();
    let runner: Arc<dyn CommandRunner> = runner.clone();
    Engine::new(stamps.clone(), runner, RunOptions { force })
}
