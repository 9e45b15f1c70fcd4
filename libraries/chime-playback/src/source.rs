//! Pull-based audio source trait
//!
//! Abstracts a single open, decodable audio stream. Decoder backends
//! (Symphonia on desktop, platform codecs elsewhere) implement this so the
//! render loop never depends on a concrete format.

use crate::error::Result;

/// An open, decodable audio stream
///
/// Samples are interleaved f32 in the [-1.0, 1.0] range with
/// `channel_count()` channels per frame. Implementations with more than
/// two source channels are expected to downmix before reporting their
/// channel count, so callers only ever see mono or stereo.
pub trait Source: Send {
    /// Decode up to `buffer.len() / channel_count()` frames into `buffer`
    ///
    /// Returns the number of frames written. A return of 0 together with
    /// `done()` signals end of stream; 0 without `done()` means the
    /// decoder produced no audio for this call (e.g. a metadata packet)
    /// and should simply be called again.
    fn decode(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Seek to an absolute frame position
    ///
    /// Returns the frame actually landed on, which may differ from the
    /// request at compressed-format packet boundaries.
    fn seek(&mut self, frame: u64) -> Result<u64>;

    /// Frames decoded so far
    fn tell(&self) -> u64;

    /// Total frames in the stream (0 if unknown)
    fn total_frames(&self) -> u64;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Channels per frame (1 or 2)
    fn channel_count(&self) -> u16;

    /// True once the stream has reached its end
    fn done(&self) -> bool;
}

/// Silence-generating source for engine unit tests
#[cfg(test)]
pub(crate) struct SilenceSource {
    total_frames: u64,
    position: u64,
    sample_rate: u32,
    channels: u16,
}

#[cfg(test)]
impl SilenceSource {
    pub(crate) fn new(total_frames: u64, sample_rate: u32, channels: u16) -> Self {
        Self {
            total_frames,
            position: 0,
            sample_rate,
            channels,
        }
    }
}

#[cfg(test)]
impl Source for SilenceSource {
    fn decode(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let capacity = buffer.len() / self.channels as usize;
        let remaining = (self.total_frames - self.position) as usize;
        let frames = remaining.min(capacity);

        buffer[..frames * self.channels as usize].fill(0.0);
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        self.position = frame.min(self.total_frames);
        Ok(self.position)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn done(&self) -> bool {
        self.position >= self.total_frames
    }
}
