//! Line-oriented renderer for pipes and CI logs.

use console::Style;
use restamp_core::{Observer, TargetState, TargetStatus};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Width of the name column.
const NAME_WIDTH: usize = 50;

fn message(state: TargetState) -> &'static str {
    match state {
        TargetState::NotOutOfDate => "nothing to do",
        TargetState::Working => "working on it",
        TargetState::Success => "success",
        TargetState::Waiting => "waiting on dependencies",
        TargetState::CantDo => "can not do",
        TargetState::CheckOutOfDate => "check if out of date",
        TargetState::Failure => "failure",
    }
}

fn style(state: TargetState) -> Style {
    match state {
        TargetState::NotOutOfDate | TargetState::Success => Style::new().green(),
        TargetState::Working => Style::new().blue().bright(),
        TargetState::Waiting | TargetState::CheckOutOfDate => Style::new().dim(),
        TargetState::CantDo | TargetState::Failure => Style::new().red(),
    }
}

struct Inner<W> {
    out: W,
    last: HashMap<String, TargetState>,
}

/// Prints one line each time a target changes state.
///
/// A failure prints the target's log between a begin and an end line.
pub struct SimpleRenderer<W: Write + Send> {
    inner: Mutex<Inner<W>>,
    colored: bool,
}

impl<W: Write + Send> SimpleRenderer<W> {
    /// Renderer writing to `out`, colored when the terminal supports it.
    pub fn new(out: W) -> Self {
        Self {
            inner: Mutex::new(Inner {
                out,
                last: HashMap::new(),
            }),
            colored: console::colors_enabled(),
        }
    }

    /// Renderer that never emits color codes.
    pub fn plain(out: W) -> Self {
        Self {
            colored: false,
            ..Self::new(out)
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner).out
    }

    fn line(&self, out: &mut W, name: &str, state: TargetState, text: &str) {
        let styled = style(state).force_styling(self.colored).apply_to(text);
        let _ = writeln!(out, "{name:<NAME_WIDTH$}    {styled}");
    }

    fn failure(&self, out: &mut W, status: &TargetStatus) {
        let reason = match (status.exit_code, status.failure.as_deref()) {
            (Some(code), _) => code.to_string(),
            (None, Some(failure)) => failure.to_string(),
            (None, None) => "unknown".to_string(),
        };
        self.line(
            out,
            &status.name,
            TargetState::Failure,
            &format!("begin of failure ({reason})"),
        );
        match fs::read(&status.log_path) {
            Ok(log) => {
                let _ = out.write_all(&log);
                if !log.is_empty() && !log.ends_with(b"\n") {
                    let _ = writeln!(out);
                }
            }
            Err(err) => {
                let _ = writeln!(out, "could not read {}: {}", status.log_path.display(), err);
            }
        }
        self.line(
            out,
            &status.name,
            TargetState::Failure,
            &format!("end of failure ({reason})"),
        );
    }
}

impl<W: Write + Send> Observer for SimpleRenderer<W> {
    fn on_state_change(&self, status: &TargetStatus) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.last.get(&status.name) == Some(&status.state) {
            return;
        }
        let _ = inner.last.insert(status.name.clone(), status.state);

        let Inner { out, .. } = &mut *inner;
        if status.state == TargetState::Failure {
            self.failure(out, status);
        } else {
            self.line(out, &status.name, status.state, message(status.state));
        }
    }

    fn stop(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = inner.out.flush();
    }
}
