// src/event.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors produced while decoding a wire frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame was not valid JSON for the status shape.
    #[error("malformed status frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame decoded but carried an unknown message type.
    #[error("unexpected frame type: {0:?}")]
    UnexpectedType(String),
}

/// One complete state frame as sent to every connected client.
///
/// Serializes to
/// `{"type": "status", "all_files": [...], "watched_files": {...}}`.
/// `all_files` is the full sorted inventory of the monitored directory;
/// `watched_files` maps each watched path to its last captured digest, or to
/// an empty string when the file has not been digestible yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Message discriminator, always `"status"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Every file currently present under the monitor root, relative paths.
    pub all_files: Vec<String>,
    /// Watched path -> last known content digest.
    pub watched_files: BTreeMap<String, String>,
}

impl StatusSnapshot {
    pub const KIND: &'static str = "status";

    pub fn new(all_files: Vec<String>, watched_files: BTreeMap<String, String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            all_files,
            watched_files,
        }
    }

    /// Decodes one newline-stripped frame, rejecting unknown message types.
    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let snapshot: StatusSnapshot = serde_json::from_str(frame)?;
        if snapshot.kind != Self::KIND {
            return Err(FrameError::UnexpectedType(snapshot.kind));
        }
        Ok(snapshot)
    }
}

/// A watched-file lifecycle event. Produced for logging only; the wire
/// protocol carries full snapshots, never individual events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched file became visible and its first digest was captured.
    Started(String),
    /// A watched file's content digest changed.
    Changed(String),
    /// A watched file disappeared from disk.
    Deleted(String),
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEvent::Started(path) => write!(f, "Started watching {}", path),
            WatchEvent::Changed(path) => write!(f, "Content changed in {}", path),
            WatchEvent::Deleted(path) => write!(f, "Watched file {} was deleted", path),
        }
    }
}
