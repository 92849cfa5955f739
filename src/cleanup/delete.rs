/// Depth-barrier deletion of output entries
///
/// Entries are grouped by path depth and deleted deepest level first. All
/// deletions of one level settle before the next shallower level starts, so
/// a listed directory is only attempted once every listed descendant is
/// gone. Entries within one level cannot contain each other and are deleted
/// concurrently.
///
/// Per entry:
/// - missing paths are skipped
/// - files are unlinked
/// - symlinks are unlinked without touching their target
/// - directories are removed only if empty; a non-empty directory is left
///   alone
///
/// Every entry path must be absolute; a relative one is rejected before
/// anything is deleted. Deletion uses the lexically normalized path, so a
/// trailing separator on a symlink entry never resolves through the link.
///
/// Any other filesystem failure stops the engine before the next shallower
/// level and is returned with the failing path.
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::entry::{AbsoluteEntry, EntryKind};
use crate::config::CleanupConfig;

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("entry path must be absolute: {}", .0.display())]
    RelativePath(PathBuf),

    #[error("cleanup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CleanupError {
    /// The path whose deletion failed, if the failure was a filesystem one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Delete { path, .. } | Self::RelativePath(path) => Some(path),
            Self::Task(_) => None,
        }
    }
}

/// Counts of what happened to the listed entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub already_gone: usize,
    pub kept_non_empty: usize,
}

impl CleanupReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Removed => self.removed += 1,
            Outcome::AlreadyGone => self.already_gone += 1,
            Outcome::NotEmpty => self.kept_non_empty += 1,
        }
    }

    fn merge(&mut self, other: CleanupReport) {
        self.removed += other.removed;
        self.already_gone += other.already_gone;
        self.kept_non_empty += other.kept_non_empty;
    }
}

/// An entry as scheduled for deletion, with its path normalized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Scheduled {
    path: PathBuf,
    kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Removed,
    AlreadyGone,
    NotEmpty,
}

/// Deletes output entries level by level with a worker pool per level
#[derive(Debug, Clone)]
pub struct OutputCleaner {
    workers: usize,
    inline_threshold: usize,
}

impl Default for OutputCleaner {
    fn default() -> Self {
        Self::new(&CleanupConfig::default())
    }
}

impl OutputCleaner {
    pub fn new(config: &CleanupConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            inline_threshold: config.inline_threshold,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_inline_threshold(mut self, inline_threshold: usize) -> Self {
        self.inline_threshold = inline_threshold;
        self
    }

    /// Delete every listed entry that exists and can be safely removed
    pub fn delete_entries(&self, entries: &[AbsoluteEntry]) -> Result<CleanupReport, CleanupError> {
        let mut report = CleanupReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let levels = group_by_depth(entries)?;

        for (depth, batch) in levels.iter().rev() {
            debug!(
                operation = "cleanup.level",
                depth = *depth,
                entry_count = batch.len(),
                "deleting depth level"
            );

            let level_report = self.delete_level(batch).inspect_err(|err| {
                warn!(
                    operation = "cleanup",
                    status = "error",
                    depth = *depth,
                    error = %err,
                    "aborting cleanup"
                );
            })?;
            report.merge(level_report);
        }

        info!(
            operation = "cleanup",
            status = "success",
            entry_count = entries.len(),
            removed = report.removed,
            already_gone = report.already_gone,
            kept_non_empty = report.kept_non_empty,
            "cleaned outputs"
        );

        Ok(report)
    }

    fn delete_level(&self, batch: &[Scheduled]) -> Result<CleanupReport, CleanupError> {
        let workers = self.workers.min(batch.len());

        if workers <= 1 || batch.len() < self.inline_threshold {
            let mut report = CleanupReport::default();
            for entry in batch {
                report.record(delete_entry(entry)?);
            }
            return Ok(report);
        }

        let (sender, receiver) = crossbeam_channel::bounded(batch.len());
        for entry in batch {
            // The receiver is alive and the channel has room for the whole batch.
            let _ = sender.send(entry);
        }
        drop(sender);

        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<CleanupError>> = Mutex::new(None);

        let reports: Vec<CleanupReport> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut report = CleanupReport::default();
                        while !failed.load(Ordering::Acquire) {
                            let Ok(entry) = receiver.recv() else {
                                break;
                            };
                            match delete_entry(entry) {
                                Ok(outcome) => report.record(outcome),
                                Err(err) => {
                                    failed.store(true, Ordering::Release);
                                    let mut slot =
                                        first_error.lock().unwrap_or_else(PoisonError::into_inner);
                                    if slot.is_none() {
                                        *slot = Some(err);
                                    }
                                    break;
                                }
                            }
                        }
                        report
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        });

        let first_error = first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = first_error {
            return Err(err);
        }

        let mut report = CleanupReport::default();
        for worker_report in reports {
            report.merge(worker_report);
        }
        Ok(report)
    }
}

/// Delete entries with the default configuration
pub fn delete_entries(entries: &[AbsoluteEntry]) -> Result<CleanupReport, CleanupError> {
    OutputCleaner::default().delete_entries(entries)
}

/// Run the cleanup engine on tokio's blocking pool
pub async fn delete_entries_async(
    entries: Vec<AbsoluteEntry>,
    config: CleanupConfig,
) -> Result<CleanupReport, CleanupError> {
    tokio::task::spawn_blocking(move || OutputCleaner::new(&config).delete_entries(&entries))
        .await?
}

/// Group entries by the depth of their normalized path, dropping duplicates
///
/// Fails on the first relative path, before any level is scheduled.
fn group_by_depth(entries: &[AbsoluteEntry]) -> Result<BTreeMap<usize, Vec<Scheduled>>, CleanupError> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut levels: BTreeMap<usize, Vec<Scheduled>> = BTreeMap::new();

    for entry in entries {
        if !entry.path.is_absolute() {
            return Err(CleanupError::RelativePath(entry.path.clone()));
        }
        let (path, depth) = normalize(&entry.path);
        let scheduled = Scheduled {
            path,
            kind: entry.kind,
        };
        if seen.insert(scheduled.clone()) {
            levels.entry(depth).or_default().push(scheduled);
        }
    }

    Ok(levels)
}

/// Lexically normalize a path and count its segments
///
/// Rebuilding the path from its components puts every separator in the
/// platform's canonical form (on Windows both `/` and `\` are separators).
fn normalize(path: &Path) -> (PathBuf, usize) {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                }
            }
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
        }
    }

    (normalized, depth)
}

fn delete_entry(entry: &Scheduled) -> Result<Outcome, CleanupError> {
    let result = match entry.kind {
        EntryKind::File => fs::remove_file(&entry.path),
        EntryKind::Symlink => remove_symlink(&entry.path),
        EntryKind::Directory => fs::remove_dir(&entry.path),
    };

    match result {
        Ok(()) => Ok(Outcome::Removed),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Outcome::AlreadyGone),
        Err(err) if entry.kind == EntryKind::Directory && is_not_empty(&err) => {
            Ok(Outcome::NotEmpty)
        }
        Err(source) => Err(CleanupError::Delete {
            path: entry.path.clone(),
            source,
        }),
    }
}

fn is_not_empty(err: &io::Error) -> bool {
    // Some platforms report a non-empty rmdir as EEXIST.
    matches!(
        err.kind(),
        io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::AlreadyExists
    )
}

#[cfg(not(windows))]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Directory symlinks and junctions on Windows are removed with `remove_dir`
#[cfg(windows)]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path).or_else(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Err(err)
        } else {
            fs::remove_dir(path).map_err(|_| err)
        }
    })
}
