//! Change detection state and the periodic poll task.
//!
//! [`ChangeDetector`] owns the three pieces of monitor state: the full file
//! inventory from the last cycle, the watch list, and the digest table for
//! watched files. [`run_monitor`] drives it on a fixed interval until
//! shutdown.

use crate::config::AppConfig;
use crate::event::{StatusSnapshot, WatchEvent};
use crate::scanner::{self, FileProbe};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, error, info, warn};

/// The detector shared between the poll task and every broadcast task.
///
/// All reads and writes go through this single guard, so each snapshot is an
/// internally consistent capture of inventory and digests together.
pub type SharedState = Arc<RwLock<ChangeDetector>>;

/// Files that appeared in or disappeared from the inventory over one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirDiff {
    pub appeared: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl DirDiff {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.deleted.is_empty()
    }
}

/// Tracks the monitored directory's file set and watched-file digests.
///
/// Paths are stored root-relative with `/` separators. The watch list is
/// always a superset of the digest table: a path leaves the table the moment
/// it leaves the watch list or disappears from disk.
#[derive(Debug)]
pub struct ChangeDetector {
    root: PathBuf,
    known_files: BTreeSet<String>,
    watch_list: BTreeSet<String>,
    hashes: BTreeMap<String, String>,
}

impl ChangeDetector {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            known_files: BTreeSet::new(),
            watch_list: BTreeSet::new(),
            hashes: BTreeMap::new(),
        }
    }

    /// The monitored directory.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Replaces the known file set with `current` and returns the set
    /// differences. Pure set arithmetic, no filesystem access.
    pub fn diff_all(&mut self, current: BTreeSet<String>) -> DirDiff {
        let appeared = current.difference(&self.known_files).cloned().collect();
        let deleted = self.known_files.difference(&current).cloned().collect();
        self.known_files = current;
        DirDiff { appeared, deleted }
    }

    /// Re-probes every watched file and returns the lifecycle events for this
    /// cycle. Iteration is in sorted path order, so repeated runs over
    /// unchanged input produce identical event ordering.
    pub fn diff_watched(&mut self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        for path in &self.watch_list {
            match scanner::probe_file(&self.root.join(path)) {
                FileProbe::Missing => {
                    if self.hashes.remove(path).is_some() {
                        events.push(WatchEvent::Deleted(path.clone()));
                    }
                }
                // Unreadable this cycle: keep the old digest and retry later.
                FileProbe::Unavailable => {}
                FileProbe::Digest(digest) => match self.hashes.get(path) {
                    None => {
                        self.hashes.insert(path.clone(), digest);
                        events.push(WatchEvent::Started(path.clone()));
                    }
                    Some(previous) if *previous != digest => {
                        self.hashes.insert(path.clone(), digest);
                        events.push(WatchEvent::Changed(path.clone()));
                    }
                    Some(_) => {}
                },
            }
        }
        events
    }

    /// Adds a file to the watch list.
    ///
    /// If the file is digestible right now its digest is captured eagerly, so
    /// watching a pre-existing file does not produce a spurious `Started`
    /// event on the next cycle.
    pub fn add_watch(&mut self, path: &str) {
        let path = path.to_string();
        self.watch_list.insert(path.clone());
        match scanner::digest_file(&self.root.join(&path)) {
            Some(digest) => {
                self.hashes.insert(path.clone(), digest);
                info!("Now watching {}", path);
            }
            None => {
                warn!(
                    "File {} doesn't exist yet, but will be watched when created",
                    path
                );
            }
        }
    }

    /// Removes a file from the watch list and digest table. Unknown paths are
    /// a no-op.
    pub fn remove_watch(&mut self, path: &str) {
        self.watch_list.remove(path);
        self.hashes.remove(path);
        info!("Stopped watching {}", path);
    }

    /// Builds the wire-level view of the current state. Every watch-list
    /// entry appears, with an empty digest when none has been captured yet.
    pub fn snapshot(&self) -> StatusSnapshot {
        let watched_files = self
            .watch_list
            .iter()
            .map(|path| {
                (
                    path.clone(),
                    self.hashes.get(path).cloned().unwrap_or_default(),
                )
            })
            .collect();
        StatusSnapshot::new(self.known_files.iter().cloned().collect(), watched_files)
    }
}

/// Primes the detector with the current directory contents so that files
/// already present at startup are not reported as new on the first cycle.
pub async fn prime_inventory(state: SharedState) -> Result<()> {
    let count = tokio::task::spawn_blocking(move || {
        let root = state.read().root().clone();
        let current = scanner::scan_files(&root);
        let count = current.len();
        state.write().diff_all(current);
        count
    })
    .await?;
    info!("Initial scan found {} files", count);
    Ok(())
}

/// Runs the poll loop: every interval, rescan the directory and re-probe the
/// watch list, then log what changed. Exits when the shutdown signal flips.
pub async fn run_monitor(
    app_config: Arc<AppConfig>,
    state: SharedState,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let interval = app_config.interval();
    let mut shutdown = shutdown_signal.clone();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let cycle_state = Arc::clone(&state);
                // Scan and digest on the blocking pool; both diffs apply
                // under one write guard so broadcast tasks never observe a
                // half-applied update.
                let cycle = tokio::task::spawn_blocking(move || {
                    let root = cycle_state.read().root().clone();
                    let current = scanner::scan_files(&root);
                    let mut detector = cycle_state.write();
                    let diff = detector.diff_all(current);
                    let events = detector.diff_watched();
                    (diff, events)
                })
                .await;

                match cycle {
                    Ok((diff, events)) => {
                        if !diff.appeared.is_empty() {
                            info!("New files detected: {:?}", diff.appeared);
                        }
                        if !diff.deleted.is_empty() {
                            info!("Files deleted: {:?}", diff.deleted);
                        }
                        for event in events {
                            info!("Change detected: {}", event);
                        }
                        if diff.is_empty() {
                            debug!("Poll cycle complete, no inventory changes");
                        }
                    }
                    Err(e) => {
                        // A panicked cycle loses one observation, not the loop.
                        error!("Poll cycle failed: {}", e);
                    }
                }
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Monitor loop shutting down due to signal.");
                    break;
                }
            }
        }
    }
    Ok(())
}
