//! Double-buffered audio sink trait
//!
//! Capability interface over the hardware audio channel. The render loop
//! drives exactly two fixed-size buffers through the
//! Free → Queued → Playing → Done cycle; which buffer is reusable is
//! governed entirely by the sink's own state reporting, never by
//! engine-side bookkeeping.

use crate::error::Result;

/// Number of hardware buffers the render loop cycles through
pub const SINK_BUFFER_COUNT: usize = 2;

/// Lifecycle state of one hardware buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Never submitted, available for filling
    Free,

    /// Submitted, waiting for the hardware to pick it up
    Queued,

    /// Currently being rendered
    Playing,

    /// Rendered to completion, available for refilling
    Done,
}

impl BufferState {
    /// True when the render loop may fill and submit this buffer
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Free | Self::Done)
    }
}

/// Hardware audio channel capability
///
/// Mix routing is a fixed policy applied by the sink: mono input is
/// duplicated to both output channels, stereo maps channel 0 to the left
/// and channel 1 to the right.
pub trait AudioSink: Send {
    /// Configure the voice for a track's format
    ///
    /// Fails with `VoiceInit` if the hardware cannot be set up for this
    /// sample rate / channel count.
    fn configure(&mut self, sample_rate: u32, channels: u16) -> Result<()>;

    /// Start (or restart) the voice; idempotent
    fn start(&mut self) -> Result<()>;

    /// Stop the voice and drop its buffer association
    fn stop(&mut self);

    /// Frame capacity of each hardware buffer
    fn buffer_frames(&self) -> usize;

    /// Current state of buffer `slot` (`0..SINK_BUFFER_COUNT`)
    fn buffer_state(&self, slot: usize) -> BufferState;

    /// Fill buffer `slot` with interleaved samples and queue it
    ///
    /// `samples.len()` must be a whole number of frames and at most
    /// `buffer_frames() * channels`.
    fn submit(&mut self, slot: usize, samples: &[f32]) -> Result<()>;

    /// Advance the pump one step: hand queued buffers to the hardware and
    /// reclaim finished ones. Called once per render-loop iteration.
    fn tick(&mut self);

    /// Block until the next hardware frame boundary (bounded wait)
    fn wait_frame(&self);

    /// Set the linear output gain
    fn set_volume(&mut self, gain: f32);
}
