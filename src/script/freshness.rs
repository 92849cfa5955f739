/// Freshness and clean decisions for the executor
///
/// Whether a script can skip running, and whether its outputs must be
/// deleted before it runs, derived from the current and previously stored
/// cache keys.
use super::cache_key::{CacheKey, CacheKeyString};
use super::config::CleanMode;

/// Why a script has to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The script or one of its dependencies has unknown inputs
    Uncacheable,
    /// Nothing was recorded for this script yet
    NoPreviousKey,
    /// Inputs changed since the recorded run
    KeyChanged,
    /// Inputs are unchanged but recorded outputs are gone
    OutputsMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Decide freshness
///
/// `current` is `None` when the script is not cacheable. `outputs_present`
/// reports whether every recorded output path still exists; that check is
/// the caller's.
pub fn check_freshness(
    current: Option<&CacheKeyString>,
    previous: Option<&CacheKeyString>,
    outputs_present: bool,
) -> Freshness {
    let Some(current) = current else {
        return Freshness::Stale(StaleReason::Uncacheable);
    };
    let Some(previous) = previous else {
        return Freshness::Stale(StaleReason::NoPreviousKey);
    };

    if current != previous {
        Freshness::Stale(StaleReason::KeyChanged)
    } else if !outputs_present {
        Freshness::Stale(StaleReason::OutputsMissing)
    } else {
        Freshness::Fresh
    }
}

impl CleanMode {
    /// Whether declared outputs must be deleted before running
    ///
    /// `IfFileDeleted` cleans when there is no previous key to compare with,
    /// or when an input file recorded last time is absent now.
    pub fn should_clean(&self, previous: Option<&CacheKey>, current: &CacheKey) -> bool {
        match self {
            CleanMode::Always => true,
            CleanMode::Never => false,
            CleanMode::IfFileDeleted => match previous {
                None => true,
                Some(previous) => previous
                    .files
                    .keys()
                    .any(|path| !current.files.contains_key(path)),
            },
        }
    }
}
