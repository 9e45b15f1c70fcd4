//! Error types for the playback engine

use std::path::PathBuf;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Enqueue target does not exist or is not an absolute path
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Index-based queue operation beyond bounds
    #[error("Index out of range: {0}")]
    OutOfRange(usize),

    /// Operation requires a non-empty queue
    #[error("Queue is empty")]
    QueueEmpty,

    /// Status query while no track is active
    #[error("Not playing")]
    NotPlaying,

    /// A source could not be constructed for a queued path
    #[error("Failed to open file: {0}")]
    FileOpen(String),

    /// The hardware channel could not be configured for the track format
    #[error("Voice init failure: {0}")]
    VoiceInit(String),

    /// Decode error from the active source
    #[error("Source error: {0}")]
    Source(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

impl PlaybackError {
    /// Stable machine-readable kind, used by control-surface adapters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "invalid_path",
            Self::OutOfRange(_) => "out_of_range",
            Self::QueueEmpty => "queue_empty",
            Self::NotPlaying => "not_playing",
            Self::FileOpen(_) => "file_open_failure",
            Self::VoiceInit(_) => "voice_init_failure",
            Self::Source(_) => "source_error",
            Self::Io(_) => "io_error",
        }
    }
}
