//! Target model: the immutable input specification and the runtime status
//! that observers see.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

/// What a target runs when it is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Free-form shell text, run through `sh -c`.
    Shell(String),

    /// A program executed directly with its arguments.
    Program {
        /// Program name or path
        program: String,
        /// Arguments passed verbatim
        args: Vec<String>,
    },

    /// Succeeds without spawning anything.
    Noop,
}

impl Command {
    /// Shell command from text.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::Shell(script.into())
    }

    /// Direct program invocation.
    pub fn program<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this command never spawns a process.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// The command as one literal line of shell.
    ///
    /// `Program` arguments are single-quoted where the shell would otherwise
    /// split or expand them. `Noop` renders as `true`.
    #[must_use]
    pub fn shell_line(&self) -> String {
        match self {
            Self::Shell(script) => script.clone(),
            Self::Program { program, args } => std::iter::once(program)
                .chain(args)
                .map(|word| shell_quote(word))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Noop => "true".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shell_line())
    }
}

/// Quote a word for POSIX `sh` unless it is made of safe characters only.
pub(crate) fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:@%+,".contains(&b));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// A named unit of work, as produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Unique target name
    pub name: String,
    /// Command to run when stale
    pub command: Command,
    /// Working directory of the command
    pub cwd: PathBuf,
    /// Names of targets that must finish first, in declaration order
    pub deps: Vec<String>,
    /// Files this target is sensitive to; `None` means only dependencies matter
    pub sources: Option<Vec<PathBuf>>,
}

impl TargetSpec {
    /// Target without dependencies or sources.
    pub fn new(name: impl Into<String>, command: Command, cwd: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command,
            cwd: cwd.into(),
            deps: Vec::new(),
            sources: None,
        }
    }

    /// Replace the dependency list.
    #[must_use]
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the source list.
    #[must_use]
    pub fn with_sources<I, P>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Working directory as a path.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

/// Lifecycle of a target within one run.
///
/// ```text
/// Waiting -> CheckOutOfDate -> NotOutOfDate
///                           -> Working -> Success | Failure
/// Waiting -> CantDo
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Waiting on dependencies
    Waiting,
    /// Comparing the stamp with sources and dependencies
    CheckOutOfDate,
    /// Stamp is newer than everything it depends on
    NotOutOfDate,
    /// A dependency failed or could not run
    CantDo,
    /// Command is running
    Working,
    /// Command exited 0
    Success,
    /// Command failed, was killed, timed out or could not start
    Failure,
}

impl TargetState {
    /// All states, in lifecycle order.
    pub const ALL: [TargetState; 7] = [
        Self::Waiting,
        Self::CheckOutOfDate,
        Self::NotOutOfDate,
        Self::CantDo,
        Self::Working,
        Self::Success,
        Self::Failure,
    ];

    /// No further transition follows.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NotOutOfDate | Self::CantDo | Self::Success | Self::Failure
        )
    }

    /// Terminal and usable by consumers.
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::NotOutOfDate | Self::Success)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Waiting => "waiting on dependencies",
            Self::CheckOutOfDate => "check if out of date",
            Self::NotOutOfDate => "not out of date",
            Self::CantDo => "can not do",
            Self::Working => "working",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        f.write_str(text)
    }
}

/// Snapshot of a target's runtime status.
#[derive(Debug, Clone)]
pub struct TargetStatus {
    /// Target name
    pub name: String,
    /// Current state
    pub state: TargetState,
    /// When the command started
    pub started: Option<Instant>,
    /// Most recent line of command output
    pub last_line: Option<String>,
    /// Stamp file location
    pub stamp_path: PathBuf,
    /// Log file location
    pub log_path: PathBuf,
    /// Completion time that consumers compare against
    pub completed_at: Option<SystemTime>,
    /// Exit code of the command, when it exited normally
    pub exit_code: Option<i32>,
    /// Why the command failed without an exit code (spawn error, timeout, signal)
    pub failure: Option<String>,
}

impl TargetStatus {
    /// Fresh status in [`TargetState::Waiting`].
    pub fn new(name: impl Into<String>, stamp_path: PathBuf, log_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            state: TargetState::Waiting,
            started: None,
            last_line: None,
            stamp_path,
            log_path,
            completed_at: None,
            exit_code: None,
            failure: None,
        }
    }
}
