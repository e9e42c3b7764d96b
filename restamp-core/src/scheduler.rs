//! Per-target state machine and its concurrent driver.
//!
//! Every plan target owns a single-assignment completion cell. All requests
//! for a target, from the top level or from its consumers, await the same
//! cell, so each target's state machine runs at most once per run.

use crate::engine::{RunOptions, RunReport};
use crate::graph::{ExecutionPlan, PlanNode};
use crate::observer::Observer;
use crate::runner::{CommandRunner, Invocation, RunOutcome};
use crate::staleness::{self, StalenessInput, StampRead, Verdict};
use crate::stamp::StampStore;
use crate::target::{TargetState, TargetStatus};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Instant, SystemTime};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Terminal state of a target and the time consumers compare against.
#[derive(Debug, Clone, Copy)]
struct Completion {
    state: TargetState,
    at: Option<SystemTime>,
}

pub(crate) struct Scheduler<'a> {
    plan: &'a ExecutionPlan,
    stamps: &'a StampStore,
    runner: &'a dyn CommandRunner,
    observer: &'a dyn Observer,
    options: RunOptions,
    cells: Vec<OnceCell<Completion>>,
    statuses: Vec<Mutex<TargetStatus>>,
}

impl<'a> Scheduler<'a> {
    pub(crate) fn new(
        plan: &'a ExecutionPlan,
        stamps: &'a StampStore,
        runner: &'a dyn CommandRunner,
        observer: &'a dyn Observer,
        options: RunOptions,
    ) -> Self {
        let statuses = plan
            .nodes()
            .iter()
            .map(|node| {
                let name = &node.spec.name;
                Mutex::new(TargetStatus::new(
                    name.clone(),
                    stamps.stamp_path(name),
                    stamps.log_path(name),
                ))
            })
            .collect();

        Self {
            plan,
            stamps,
            runner,
            observer,
            options,
            cells: plan.nodes().iter().map(|_| OnceCell::new()).collect(),
            statuses,
        }
    }

    /// Request every target at once and wait until all are terminal.
    pub(crate) async fn run_all(&self) {
        let _ = join_all((0..self.plan.len()).map(|index| self.request(index))).await;
    }

    pub(crate) fn into_report(self) -> RunReport {
        RunReport::new(
            self.statuses
                .into_iter()
                .map(|status| status.into_inner().unwrap_or_else(PoisonError::into_inner))
                .collect(),
        )
    }

    fn request(&self, index: usize) -> LocalBoxFuture<'_, Completion> {
        async move { *self.cells[index].get_or_init(|| self.drive(index)).await }.boxed_local()
    }

    async fn drive(&self, index: usize) -> Completion {
        let node = &self.plan.nodes()[index];
        self.transition(index, TargetState::Waiting, |_| {});

        let deps = join_all(node.deps.iter().map(|&dep| self.request(dep))).await;
        if deps.iter().any(|dep| !dep.state.is_done()) {
            return self.finish(index, TargetState::CantDo, None, |_| {});
        }

        self.transition(index, TargetState::CheckOutOfDate, |_| {});
        let stamp = self.stamps.read(&node.spec.name);
        let sources = stat_sources(node);
        let dependencies: Vec<(String, SystemTime)> = node
            .deps
            .iter()
            .zip(&deps)
            .filter_map(|(&dep, done)| {
                done.at
                    .map(|at| (self.plan.nodes()[dep].spec.name.clone(), at))
            })
            .collect();

        let verdict = staleness::evaluate(&StalenessInput {
            force: self.options.force,
            stamp,
            sources: &sources,
            dependencies: &dependencies,
        });

        match (verdict, stamp) {
            (Verdict::Fresh, StampRead::At(at)) => {
                self.finish(index, TargetState::NotOutOfDate, Some(at), |_| {})
            }
            (Verdict::Stale(reason), _) => {
                debug!("{} is stale: {}", node.spec.name, reason);
                self.execute(index, node).await
            }
            // A fresh verdict always comes with a stamp time
            (Verdict::Fresh, _) => self.execute(index, node).await,
        }
    }

    async fn execute(&self, index: usize, node: &PlanNode) -> Completion {
        let name = node.spec.name.as_str();
        self.transition(index, TargetState::Working, |status| {
            status.started = Some(Instant::now());
        });

        let outcome = if node.spec.command.is_noop() {
            if let Err(err) = self.stamps.reset_log(name) {
                warn!("could not create log for {}: {}", name, err);
            }
            Ok(RunOutcome::Exited(0))
        } else {
            let log_path = self.stamps.log_path(name);
            let invocation = Invocation {
                name,
                command: &node.spec.command,
                cwd: &node.spec.cwd,
                log_path: &log_path,
            };
            let on_line = |line: &str| self.output(index, line);
            self.runner.run(&invocation, &on_line).await
        };

        match outcome {
            Ok(outcome) if outcome.success() => {
                let at = match self.stamps.write(name) {
                    Ok(at) => at,
                    Err(err) => {
                        warn!("could not write stamp for {}: {}", name, err);
                        SystemTime::now()
                    }
                };
                self.finish(index, TargetState::Success, Some(at), |status| {
                    status.exit_code = Some(0);
                })
            }
            Ok(outcome) => self.finish(index, TargetState::Failure, None, |status| {
                status.exit_code = outcome.exit_code();
                status.failure = match outcome {
                    RunOutcome::TimedOut => Some("timed out".to_string()),
                    RunOutcome::Signaled => Some("terminated by signal".to_string()),
                    RunOutcome::Exited(_) => None,
                };
            }),
            Err(err) => self.finish(index, TargetState::Failure, None, |status| {
                status.failure = Some(err.to_string());
            }),
        }
    }

    fn finish(
        &self,
        index: usize,
        state: TargetState,
        at: Option<SystemTime>,
        update: impl FnOnce(&mut TargetStatus),
    ) -> Completion {
        self.transition(index, state, |status| {
            status.completed_at = at;
            update(status);
        });
        Completion { state, at }
    }

    fn transition(&self, index: usize, state: TargetState, update: impl FnOnce(&mut TargetStatus)) {
        let snapshot = {
            let mut status = self.statuses[index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            status.state = state;
            update(&mut status);
            status.clone()
        };
        self.observer.on_state_change(&snapshot);
    }

    fn output(&self, index: usize, line: &str) {
        let snapshot = {
            let mut status = self.statuses[index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            status.last_line = Some(line.to_string());
            status.clone()
        };
        self.observer.on_output(&snapshot);
    }
}

/// Modification times of the target's sources inside its working directory.
fn stat_sources(node: &PlanNode) -> Vec<(PathBuf, Option<SystemTime>)> {
    let Some(sources) = &node.spec.sources else {
        return Vec::new();
    };
    staleness::sources_under(&node.spec.cwd, sources)
        .map(|source| {
            let modified = std::fs::metadata(source).and_then(|meta| meta.modified());
            (source.clone(), modified.ok())
        })
        .collect()
}
