//! Running target commands.
//!
//! The engine never spawns processes itself; it goes through a
//! [`CommandRunner`] handed to it at construction. [`ProcessRunner`] is the
//! production implementation, tests substitute their own.

use crate::target::Command;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{self, Child};
use tracing::{error, info, warn};

/// Errors that keep a command from producing an exit status.
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be started
    #[error("could not start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// The log file could not be written
    #[error("could not write log {}: {source}", path.display())]
    Log {
        /// Log file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Reading output or waiting for the process failed
    #[error("I/O error while running command: {0}")]
    Io(#[from] io::Error),
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited with a code
    Exited(i32),
    /// The process was terminated by a signal
    Signaled,
    /// The process was killed after exceeding the timeout
    TimedOut,
}

impl RunOutcome {
    /// Exit code 0.
    #[must_use]
    pub fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Exit code, when the process exited on its own.
    #[must_use]
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            Self::Signaled | Self::TimedOut => None,
        }
    }
}

/// One command to run.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Target name
    pub name: &'a str,
    /// What to run
    pub command: &'a Command,
    /// Working directory
    pub cwd: &'a Path,
    /// Where combined output goes
    pub log_path: &'a Path,
}

/// Receives each output line of a running command.
pub type LineSink<'s> = dyn for<'l> Fn(&'l str) + Send + Sync + 's;

/// Runs commands on behalf of the engine.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion.
    ///
    /// Every output line, from stdout and stderr alike, is appended to the
    /// invocation's log file and passed to `on_line`.
    async fn run(
        &self,
        invocation: &Invocation<'_>,
        on_line: &LineSink<'_>,
    ) -> Result<RunOutcome, RunError>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: String,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Runner using `sh`, no extra environment, no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Shell used for [`Command::Shell`].
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set an environment variable for every command.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.env.insert(key.into(), value.into());
        self
    }

    /// Kill commands that run longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn pump(
        child: &mut Child,
        log: &mut File,
        log_path: &Path,
        on_line: &LineSink<'_>,
    ) -> Result<ExitStatus, RunError> {
        let log_error = |source: io::Error| RunError::Log {
            path: log_path.to_path_buf(),
            source,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr not captured"))?;

        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let (mut stdout_open, mut stderr_open) = (true, true);

        loop {
            let (segment, from_stdout) = tokio::select! {
                segment = stdout.next_segment(), if stdout_open => (segment?, true),
                segment = stderr.next_segment(), if stderr_open => (segment?, false),
                else => break,
            };

            match segment {
                Some(bytes) => {
                    log.write_all(&bytes).await.map_err(log_error)?;
                    log.write_all(b"\n").await.map_err(log_error)?;
                    let line = String::from_utf8_lossy(&bytes);
                    on_line(line.trim_end_matches('\r'));
                }
                None if from_stdout => stdout_open = false,
                None => stderr_open = false,
            }
        }

        log.flush().await.map_err(log_error)?;
        Ok(child.wait().await?)
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation<'_>,
        on_line: &LineSink<'_>,
    ) -> Result<RunOutcome, RunError> {
        let (program, args): (&str, Vec<&str>) = match invocation.command {
            Command::Shell(script) => (self.shell.as_str(), vec!["-c", script.as_str()]),
            Command::Program { program, args } => {
                (program.as_str(), args.iter().map(String::as_str).collect())
            }
            Command::Noop => return Ok(RunOutcome::Exited(0)),
        };

        let mut log = File::create(invocation.log_path)
            .await
            .map_err(|source| RunError::Log {
                path: invocation.log_path.to_path_buf(),
                source,
            })?;

        let mut command = process::Command::new(program);
        let _ = command
            .args(&args)
            .current_dir(invocation.cwd)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("{}: running {}", invocation.name, invocation.command);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!("{}: could not start {}: {}", invocation.name, program, source);
                let message = format!("could not start {program}: {source}\n");
                let _ = log.write_all(message.as_bytes()).await;
                let _ = log.flush().await;
                return Err(RunError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        };

        let pumped = Self::pump(&mut child, &mut log, invocation.log_path, on_line);
        let waited = match self.timeout {
            None => Ok(pumped.await),
            Some(limit) => tokio::time::timeout(limit, pumped).await.map_err(|_| limit),
        };
        let status = match waited {
            Ok(status) => status?,
            Err(limit) => {
                warn!("{}: timed out after {:?}, killing", invocation.name, limit);
                let _ = child.kill().await;
                let message = format!("timed out after {limit:?}\n");
                let _ = log.write_all(message.as_bytes()).await;
                let _ = log.flush().await;
                return Ok(RunOutcome::TimedOut);
            }
        };

        let outcome = match status.code() {
            Some(code) => RunOutcome::Exited(code),
            None => RunOutcome::Signaled,
        };
        info!("{}: finished with {:?}", invocation.name, outcome);
        Ok(outcome)
    }
}
