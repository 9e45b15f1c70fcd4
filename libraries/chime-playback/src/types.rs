//! Core types for the playback engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A queued track, identified by its file path.
///
/// Equality is by value; the queue places no uniqueness requirement on
/// entries, so the same path may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Absolute path to the audio file
    pub path: PathBuf,
}

impl Track {
    /// Create a track reference from a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path for decoding
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where an enqueued track is inserted in the linear playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Insert at the head of the playlist (plays after the current track
    /// when the cursor advances past it)
    Front,

    /// Append to the tail of the playlist
    Back,
}

/// Shuffle mode: selects which of the two queue orderings is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Linear playlist order
    Off,

    /// Randomized mirror order
    On,
}

/// Repeat mode: governs end-of-track and end-of-queue behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop (set pause intent) when the queue wraps
    Off,

    /// Replay the current track
    One,

    /// Loop the entire queue
    All,
}

/// Coarse playback status reported to control-surface callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No track is loaded
    Stopped,

    /// A track is loaded and the render loop is feeding the sink
    Playing,

    /// A track is loaded but pause intent is set
    Paused,
}

/// Live decode position for the playing track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStats {
    /// Sample rate of the open source, in Hz
    pub sample_rate: u32,

    /// Frames decoded so far
    pub current_frame: u64,

    /// Total frames in the track (0 if unknown)
    pub total_frames: u64,
}

/// Snapshot of the track the engine is presently playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    /// Identity of the playing track
    pub track: Track,

    /// Decode position reported by the live source
    pub stats: TrackStats,
}
