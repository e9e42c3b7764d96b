//! Incremental target execution engine.
//!
//! Targets are named shell commands with a working directory, a list of
//! dependencies and an optional list of source files. The engine:
//!
//! 1. Builds a [`TargetGraph`] and narrows it to an [`ExecutionPlan`] (the
//!    focused targets plus everything they depend on)
//! 2. Decides per target whether its stamp file is older than its sources
//!    and dependencies ([`staleness`])
//! 3. Runs every stale target once, as soon as its dependencies are done,
//!    with no limit on how many commands run side by side ([`Engine`])
//! 4. Records successful completions as zero-byte stamp files ([`StampStore`])
//!
//! A failed target never stops unrelated targets; its consumers end up in
//! [`TargetState::CantDo`] without running.
//!
//! ```no_run
//! use restamp_core::{Command, Engine, NullObserver, ProcessRunner, RunOptions, StampStore, TargetGraph, TargetSpec};
//! use std::sync::Arc;
//!
//! # async fn demo() -> restamp_core::Result<()> {
//! let graph = TargetGraph::build(vec![
//!     TargetSpec::new("build-lib", Command::shell("make lib"), "lib"),
//!     TargetSpec::new("build-app", Command::shell("make app"), "app").with_deps(["build-lib"]),
//! ])?;
//! let plan = graph.focus(&["build-app"])?;
//!
//! let stamps = StampStore::new(".restamp");
//! stamps.prepare()?;
//! let engine = Engine::new(stamps, Arc::new(ProcessRunner::new()), RunOptions::default());
//! let report = engine.run(&plan, &NullObserver).await;
//! assert!(report.succeeded());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod observer;
pub mod runner;
mod scheduler;
pub mod staleness;
pub mod stamp;
pub mod target;

pub use engine::{Engine, RunOptions, RunReport};
pub use error::{EngineError, Result};
pub use graph::{ExecutionPlan, PlanNode, TargetGraph};
pub use observer::{NullObserver, Observer, Recorder, Transition};
pub use runner::{CommandRunner, Invocation, LineSink, ProcessRunner, RunError, RunOutcome};
pub use staleness::{StaleReason, StalenessInput, StampRead, Verdict};
pub use stamp::StampStore;
pub use target::{Command, TargetSpec, TargetState, TargetStatus};
