//! Filesystem enumeration and content digesting for the poll cycle.
//!
//! Everything here is synchronous blocking I/O and is expected to run on the
//! blocking thread pool, never directly on the async executor.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Outcome of probing one watched file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileProbe {
    /// The file does not exist.
    Missing,
    /// The file exists but could not be read this cycle (permissions, a race
    /// with deletion mid-read). Callers treat this as "no new data".
    Unavailable,
    /// The file was read and digested.
    Digest(String),
}

/// Enumerates every regular file under `root`, as root-relative paths with
/// `/` separators.
///
/// Individual unreadable entries are skipped with a warning; they never abort
/// the scan. Symbolic links are not followed.
pub fn scan_files(root: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().strip_prefix(root) {
            Ok(rel) => {
                files.insert(relative_key(rel));
            }
            Err(_) => {
                warn!(
                    "Entry {} is outside the monitor root, skipping",
                    entry.path().display()
                );
            }
        }
    }
    files
}

/// Computes the streaming SHA-256 digest of a file's content, lowercase hex.
///
/// Returns `None` on any read failure; change detection simply retries on the
/// next cycle.
pub fn digest_file(path: &Path) -> Option<String> {
    match try_digest(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            warn!("Error calculating digest for {}: {}", path.display(), e);
            None
        }
    }
}

/// Probes a watched file, distinguishing "gone" from "unreadable right now".
pub fn probe_file(path: &Path) -> FileProbe {
    match try_digest(path) {
        Ok(digest) => FileProbe::Digest(digest),
        Err(e) if e.kind() == io::ErrorKind::NotFound => FileProbe::Missing,
        Err(e) => {
            warn!("Error probing {}: {}", path.display(), e);
            FileProbe::Unavailable
        }
    }
}

fn try_digest(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Normalizes a root-relative path to the wire representation.
fn relative_key(rel: &Path) -> String {
    rel.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}
