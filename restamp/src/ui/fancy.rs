//! Live renderer: a clock header and one spinner line per target.

use super::clean_line;
use chrono::Local;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use restamp_core::{ExecutionPlan, Observer, TargetState, TargetStatus};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const TICK: Duration = Duration::from_millis(100);

/// Spinner frames while a command runs; the last one shows once finished.
const WORKING_FRAMES: [&str; 5] = ["◐", "◓", "◑", "◒", "◉"];

fn style_for(state: TargetState) -> ProgressStyle {
    let (glyph, color) = match state {
        TargetState::Waiting | TargetState::CheckOutOfDate => ("◎", "black.bright"),
        TargetState::CantDo => ("◎", "white"),
        TargetState::Working => ("◐", "cyan"),
        TargetState::Success => ("◉", "green.bright"),
        TargetState::NotOutOfDate => ("◉", "green"),
        TargetState::Failure => ("◉", "red"),
    };
    let template = format!("{{spinner:.{color}}} {{prefix:50}} {{msg}}");
    let style = ProgressStyle::with_template(&template).unwrap_or_else(|err| {
        debug!("falling back to the default spinner: {}", err);
        ProgressStyle::default_spinner()
    });
    if state == TargetState::Working {
        style.tick_strings(&WORKING_FRAMES)
    } else {
        style.tick_strings(&[glyph, glyph])
    }
}

#[derive(Default)]
struct Progress {
    states: HashMap<String, TargetState>,
    logs: HashMap<String, PathBuf>,
}

/// Redraws every target in place while the run is going.
///
/// Once stopped, the log of each failed target is printed tab-indented
/// below the final frame.
pub struct FancyRenderer {
    multi: MultiProgress,
    header: ProgressBar,
    order: Vec<String>,
    bars: HashMap<String, ProgressBar>,
    styles: HashMap<TargetState, ProgressStyle>,
    progress: Mutex<Progress>,
}

impl FancyRenderer {
    /// Renderer drawing to stdout.
    #[must_use]
    pub fn new(plan: &ExecutionPlan) -> Self {
        Self::with_draw_target(plan, ProgressDrawTarget::stdout())
    }

    /// Renderer drawing to `target`.
    #[must_use]
    pub fn with_draw_target(plan: &ExecutionPlan, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let header = multi.add(ProgressBar::new_spinner());
        header.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let styles: HashMap<_, _> = TargetState::ALL
            .into_iter()
            .map(|state| (state, style_for(state)))
            .collect();

        let order: Vec<String> = plan.names().map(str::to_string).collect();
        let bars = order
            .iter()
            .map(|name| {
                let bar = multi.add(ProgressBar::new_spinner());
                if let Some(style) = styles.get(&TargetState::Waiting) {
                    bar.set_style(style.clone());
                }
                bar.set_prefix(name.clone());
                (name.clone(), bar)
            })
            .collect();

        let renderer = Self {
            multi,
            header,
            order,
            bars,
            styles,
            progress: Mutex::new(Progress::default()),
        };
        renderer.refresh_header(0);
        renderer
    }

    fn refresh_header(&self, finished: usize) {
        self.header.set_message(format!(
            "{}    {}/{} done",
            Local::now().format("%H:%M:%S"),
            finished,
            self.order.len()
        ));
    }

    /// Log paths of the failed targets, in plan order.
    fn failed_logs(&self) -> Vec<(String, PathBuf)> {
        let progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        self.order
            .iter()
            .filter(|name| progress.states.get(*name) == Some(&TargetState::Failure))
            .filter_map(|name| {
                progress
                    .logs
                    .get(name)
                    .map(|log| (name.clone(), log.clone()))
            })
            .collect()
    }
}

impl Observer for FancyRenderer {
    fn on_state_change(&self, status: &TargetStatus) {
        let finished = {
            let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = progress.states.insert(status.name.clone(), status.state);
            let _ = progress
                .logs
                .insert(status.name.clone(), status.log_path.clone());
            progress.states.values().filter(|state| state.is_terminal()).count()
        };
        self.refresh_header(finished);

        let Some(bar) = self.bars.get(&status.name) else {
            return;
        };
        if let Some(style) = self.styles.get(&status.state) {
            bar.set_style(style.clone());
        }
        match status.state {
            TargetState::Working => bar.enable_steady_tick(TICK),
            TargetState::Failure => {
                bar.set_message(match (status.exit_code, status.failure.as_deref()) {
                    (Some(code), _) => format!("exit {code}"),
                    (None, Some(failure)) => failure.to_string(),
                    (None, None) => String::new(),
                });
                bar.finish();
            }
            state if state.is_terminal() => bar.finish(),
            _ => bar.tick(),
        }
    }

    fn on_output(&self, status: &TargetStatus) {
        if let (Some(bar), Some(line)) = (self.bars.get(&status.name), status.last_line.as_deref()) {
            bar.set_message(clean_line(line));
        }
    }

    fn stop(&self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
        self.header.finish();

        for (name, log) in self.failed_logs() {
            let _ = self.multi.println(format!("{name}:"));
            match fs::read_to_string(&log) {
                Ok(content) => {
                    for line in content.trim().lines() {
                        let _ = self.multi.println(format!("\t{}", clean_line(line)));
                    }
                }
                Err(err) => {
                    let _ = self
                        .multi
                        .println(format!("\tcould not read {}: {}", log.display(), err));
                }
            }
        }
    }
}
