//! Deciding whether a target must run.
//!
//! [`evaluate`] is pure: the scheduler reads the stamp and stats the sources
//! beforehand and hands the results in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of reading a target's stamp file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampRead {
    /// No stamp: the target never completed
    Missing,
    /// The stamp exists but its time could not be read
    Unreadable,
    /// Modification time of the stamp
    At(SystemTime),
}

/// Why a target is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Forced by the caller
    Forced,
    /// No usable stamp
    NeverCompleted,
    /// A source was modified at or after the stamp time
    SourceChanged(PathBuf),
    /// A dependency completed at or after the stamp time
    DependencyNewer(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => f.write_str("forced"),
            Self::NeverCompleted => f.write_str("never completed"),
            Self::SourceChanged(path) => write!(f, "source {} changed", path.display()),
            Self::DependencyNewer(name) => write!(f, "dependency {name} is newer"),
        }
    }
}

/// Outcome of the staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing changed since the stamp was written
    Fresh,
    /// The command must run
    Stale(StaleReason),
}

impl Verdict {
    /// Whether the command must run.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Everything the check looks at.
#[derive(Debug, Clone)]
pub struct StalenessInput<'a> {
    /// Run regardless of times
    pub force: bool,
    /// The target's own stamp
    pub stamp: StampRead,
    /// Sources with their modification time; `None` if the stat failed
    pub sources: &'a [(PathBuf, Option<SystemTime>)],
    /// Completion times of the direct dependencies
    pub dependencies: &'a [(String, SystemTime)],
}

/// Decide whether a target is stale.
///
/// Any source or dependency time equal to or later than the stamp time makes
/// the target stale. A source whose stat failed counts as the epoch.
#[must_use]
pub fn evaluate(input: &StalenessInput<'_>) -> Verdict {
    if input.force {
        return Verdict::Stale(StaleReason::Forced);
    }

    let stamp = match input.stamp {
        StampRead::At(time) => time,
        StampRead::Missing | StampRead::Unreadable => {
            return Verdict::Stale(StaleReason::NeverCompleted);
        }
    };

    if let Some((path, _)) = input
        .sources
        .iter()
        .find(|(_, modified)| modified.unwrap_or(UNIX_EPOCH) >= stamp)
    {
        return Verdict::Stale(StaleReason::SourceChanged(path.clone()));
    }

    if let Some((name, _)) = input.dependencies.iter().find(|(_, done)| *done >= stamp) {
        return Verdict::Stale(StaleReason::DependencyNewer(name.clone()));
    }

    Verdict::Fresh
}

/// Sources lying inside `cwd`, compared component by component.
pub fn sources_under<'a>(cwd: &'a Path, sources: &'a [PathBuf]) -> impl Iterator<Item = &'a PathBuf> {
    sources.iter().filter(move |source| source.starts_with(cwd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn input<'a>(
        stamp: StampRead,
        sources: &'a [(PathBuf, Option<SystemTime>)],
        dependencies: &'a [(String, SystemTime)],
    ) -> StalenessInput<'a> {
        StalenessInput {
            force: false,
            stamp,
            sources,
            dependencies,
        }
    }

    #[test]
    fn test_force_wins() {
        let mut check = input(StampRead::At(at(100)), &[], &[]);
        check.force = true;
        assert_eq!(evaluate(&check), Verdict::Stale(StaleReason::Forced));
    }

    #[test]
    fn test_missing_or_unreadable_stamp() {
        assert_eq!(
            evaluate(&input(StampRead::Missing, &[], &[])),
            Verdict::Stale(StaleReason::NeverCompleted)
        );
        assert_eq!(
            evaluate(&input(StampRead::Unreadable, &[], &[])),
            Verdict::Stale(StaleReason::NeverCompleted)
        );
    }

    #[test]
    fn test_no_inputs_is_fresh() {
        assert_eq!(evaluate(&input(StampRead::At(at(100)), &[], &[])), Verdict::Fresh);
    }

    #[test]
    fn test_equal_times_are_stale() {
        let sources = [(PathBuf::from("a.js"), Some(at(100)))];
        assert_eq!(
            evaluate(&input(StampRead::At(at(100)), &sources, &[])),
            Verdict::Stale(StaleReason::SourceChanged(PathBuf::from("a.js")))
        );

        let deps = [("build-a".to_string(), at(100))];
        assert_eq!(
            evaluate(&input(StampRead::At(at(100)), &[], &deps)),
            Verdict::Stale(StaleReason::DependencyNewer("build-a".to_string()))
        );
    }

    #[test]
    fn test_older_inputs_are_fresh() {
        let sources = [(PathBuf::from("a.js"), Some(at(99)))];
        let deps = [("build-a".to_string(), at(50))];
        assert_eq!(
            evaluate(&input(StampRead::At(at(100)), &sources, &deps)),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_failed_stat_never_forces() {
        let sources = [(PathBuf::from("gone.js"), None)];
        assert!(!evaluate(&input(StampRead::At(at(1)), &sources, &[])).is_stale());
    }

    #[test]
    fn test_sources_under_is_component_wise() {
        let sources = vec![
            PathBuf::from("packages/app/index.js"),
            PathBuf::from("packages/app-extra/index.js"),
            PathBuf::from("packages/lib/index.js"),
        ];
        let under: Vec<_> = sources_under(Path::new("packages/app"), &sources).collect();
        assert_eq!(under, vec![&PathBuf::from("packages/app/index.js")]);
    }
}
