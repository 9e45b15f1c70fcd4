//! Symphonia-backed audio sources
//!
//! Supplies the decoder side of the playback engine: a streaming
//! [`SymphoniaSource`] implementing `chime_playback::Source`, and the
//! [`open_source`] factory the engine is constructed with. Format support
//! is gated by file extension before Symphonia ever probes the file, so
//! unsupported containers fail fast with a typed error.

pub mod decoder;
pub mod error;

pub use decoder::SymphoniaSource;
pub use error::{AudioError, Result};

use chime_playback::Source;
use std::path::Path;

/// Supported audio containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Mp3,
    Flac,
    Wav,
}

impl Format {
    /// Sniff the format from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Source factory for `PlayerEngine`
///
/// Dispatches on the file extension, then hands every supported format to
/// the shared Symphonia pipeline.
pub fn open_source(path: &Path) -> chime_playback::Result<Box<dyn Source>> {
    if Format::from_path(path).is_none() {
        return Err(AudioError::UnsupportedFormat(path.display().to_string()).into());
    }
    Ok(Box::new(SymphoniaSource::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_playback::PlaybackError;
    use std::path::PathBuf;

    fn write_wav(dir: &Path, name: &str, channels: u16, frames: u32) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                // Distinct ramp per channel so misrouting would show up
                let value = ((i as i32 % 100) * 100 + i32::from(ch)) as i16;
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn format_sniffing() {
        assert_eq!(Format::from_path(Path::new("/a/b.mp3")), Some(Format::Mp3));
        assert_eq!(Format::from_path(Path::new("/a/B.FLAC")), Some(Format::Flac));
        assert_eq!(Format::from_path(Path::new("/a/b.wav")), Some(Format::Wav));
        assert_eq!(Format::from_path(Path::new("/a/b.ogg")), None);
        assert_eq!(Format::from_path(Path::new("/a/noext")), None);
    }

    #[test]
    fn unsupported_extension_fails_fast() {
        let err = open_source(Path::new("/music/notes.txt")).err().unwrap();
        assert!(matches!(err, PlaybackError::FileOpen(_)));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = open_source(Path::new("/nonexistent/file.mp3")).err().unwrap();
        assert!(matches!(err, PlaybackError::FileOpen(_)));
    }

    #[test]
    fn wav_decodes_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 2, 800);

        let mut source = open_source(&path).unwrap();
        assert_eq!(source.sample_rate(), 8000);
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.total_frames(), 800);

        let mut buffer = vec![0.0f32; 256 * 2];
        let mut decoded = 0u64;
        loop {
            let frames = source.decode(&mut buffer).unwrap();
            if frames == 0 {
                if source.done() {
                    break;
                }
                continue;
            }
            if decoded == 0 {
                // First frame of channel 0 should be sample value 0
                assert!(buffer[0].abs() < 1e-4);
                // Second frame, channel 0: 100 / 32768
                assert!((buffer[2] - 100.0 / 32768.0).abs() < 1e-4);
            }
            decoded += frames as u64;
        }

        assert_eq!(decoded, 800);
        assert_eq!(source.tell(), 800);
    }

    #[test]
    fn mono_wav_reports_one_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "mono.wav", 1, 100);

        let mut source = open_source(&path).unwrap();
        assert_eq!(source.channel_count(), 1);

        let mut buffer = vec![0.0f32; 100];
        let frames = source.decode(&mut buffer).unwrap();
        assert_eq!(frames, 100);

        // End of stream surfaces on the next call at the latest
        assert_eq!(source.decode(&mut buffer).unwrap(), 0);
        assert!(source.done());
    }

    #[test]
    fn wav_seek_lands_on_requested_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "seek.wav", 2, 800);

        let mut source = open_source(&path).unwrap();
        let landed = source.seek(400).unwrap();
        assert_eq!(landed, 400);
        assert_eq!(source.tell(), 400);

        let mut buffer = vec![0.0f32; 800 * 2];
        let mut remaining = 0u64;
        loop {
            let frames = source.decode(&mut buffer).unwrap();
            if frames == 0 && source.done() {
                break;
            }
            remaining += frames as u64;
        }
        assert_eq!(remaining, 400);
    }

    #[test]
    fn seek_clamps_past_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "clamp.wav", 2, 100);

        let mut source = open_source(&path).unwrap();
        let landed = source.seek(10_000).unwrap();
        assert!(landed <= 100);
    }
}
