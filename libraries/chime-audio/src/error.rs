/// Decoder-specific errors
use chime_playback::PlaybackError;
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio decoding error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Extension is not one of the supported formats
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Seek error
    #[error("Seek error: {0}")]
    SeekError(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Container / probe error from Symphonia
    #[error("Symphonia error: {0}")]
    Symphonia(String),
}

impl From<AudioError> for PlaybackError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::FileNotFound(_)
            | AudioError::UnsupportedFormat(_)
            | AudioError::Symphonia(_) => PlaybackError::FileOpen(err.to_string()),
            AudioError::DecodeError(_) | AudioError::SeekError(_) => {
                PlaybackError::Source(err.to_string())
            }
            AudioError::Io(e) => PlaybackError::Io(e),
        }
    }
}
