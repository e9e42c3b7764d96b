//! Restamp - incremental task runner for package.json workspaces
//!
//! Orchestrates:
//! 1. Workspace discovery (root manifest, package globs, tracked files)
//! 2. Target construction for the chosen verb
//! 3. Plan resolution with `restamp-core`
//! 4. Execution with live progress, or export to make/redo

pub mod commands;
pub mod discovery;
pub mod ui;
