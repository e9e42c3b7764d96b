//! Terminal renderers for run progress.
//!
//! Both renderers implement [`restamp_core::Observer`]; the mode is resolved
//! once at startup.

pub mod fancy;
pub mod simple;

pub use fancy::FancyRenderer;
pub use simple::SimpleRenderer;

use console::Term;
use restamp_core::{ExecutionPlan, Observer};

/// Which renderer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    /// Fancy on a terminal, simple otherwise
    Auto,
    /// Live spinner per target
    Fancy,
    /// One line per state change
    Simple,
}

impl UiMode {
    /// Replace `Auto` by the mode that fits stdout.
    #[must_use]
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if Term::stdout().is_term() => Self::Fancy,
            Self::Auto => Self::Simple,
            other => other,
        }
    }
}

/// Renderer for `mode` drawing the targets of `plan`.
pub fn observer(mode: UiMode, plan: &ExecutionPlan) -> Box<dyn Observer> {
    match mode.resolve() {
        UiMode::Fancy => Box::new(FancyRenderer::new(plan)),
        UiMode::Auto | UiMode::Simple => Box::new(SimpleRenderer::new(std::io::stdout())),
    }
}

/// Output line without terminal control sequences.
pub(crate) fn clean_line(line: &str) -> String {
    console::strip_ansi_codes(line).replace('\r', "")
}
