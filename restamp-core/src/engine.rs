//! Engine facade: runs an [`ExecutionPlan`] and reports the outcome.

use crate::graph::ExecutionPlan;
use crate::observer::Observer;
use crate::runner::CommandRunner;
use crate::scheduler::Scheduler;
use crate::stamp::StampStore;
use crate::target::{TargetState, TargetStatus};
use std::sync::Arc;
use tracing::info;

/// Knobs for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Treat every target as stale
    pub force: bool,
}

/// Executes plans against a stamp store.
pub struct Engine {
    stamps: StampStore,
    runner: Arc<dyn CommandRunner>,
    options: RunOptions,
}

impl Engine {
    /// Engine with the given stamp store, command runner and options.
    pub fn new(stamps: StampStore, runner: Arc<dyn CommandRunner>, options: RunOptions) -> Self {
        Self {
            stamps,
            runner,
            options,
        }
    }

    /// The stamp store this engine reads and writes.
    #[must_use]
    pub fn stamps(&self) -> &StampStore {
        &self.stamps
    }

    /// Run every target in the plan that is stale, dependencies first.
    ///
    /// Returns once all targets are terminal; `observer.stop()` is called
    /// right before returning.
    pub async fn run(&self, plan: &ExecutionPlan, observer: &dyn Observer) -> RunReport {
        info!("running {} targets (force: {})", plan.len(), self.options.force);

        let scheduler = Scheduler::new(
            plan,
            &self.stamps,
            self.runner.as_ref(),
            observer,
            self.options,
        );
        scheduler.run_all().await;
        let report = scheduler.into_report();

        info!(
            "done: {} succeeded, {} up to date, {} failed, {} skipped",
            report.count(TargetState::Success),
            report.count(TargetState::NotOutOfDate),
            report.count(TargetState::Failure),
            report.count(TargetState::CantDo),
        );
        observer.stop();
        report
    }
}

/// Final status of every target in a run, in plan order.
#[derive(Debug, Clone)]
pub struct RunReport {
    statuses: Vec<TargetStatus>,
}

impl RunReport {
    pub(crate) fn new(statuses: Vec<TargetStatus>) -> Self {
        Self { statuses }
    }

    /// No target ended in [`TargetState::Failure`].
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self
            .statuses
            .iter()
            .any(|status| status.state == TargetState::Failure)
    }

    /// All statuses in plan order.
    #[must_use]
    pub fn statuses(&self) -> &[TargetStatus] {
        &self.statuses
    }

    /// Status of one target.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TargetStatus> {
        self.statuses.iter().find(|status| status.name == name)
    }

    /// Final state of one target.
    #[must_use]
    pub fn state_of(&self, name: &str) -> Option<TargetState> {
        self.get(name).map(|status| status.state)
    }

    /// How many targets ended in `state`.
    #[must_use]
    pub fn count(&self, state: TargetState) -> usize {
        self.statuses
            .iter()
            .filter(|status| status.state == state)
            .count()
    }

    /// Targets that ended in [`TargetState::Failure`].
    pub fn failures(&self) -> impl Iterator<Item = &TargetStatus> {
        self.statuses
            .iter()
            .filter(|status| status.state == TargetState::Failure)
    }
}
