//! Double-buffered render loop
//!
//! Streams one track from a [`Source`] into an [`AudioSink`], alternating
//! between the sink's two hardware buffers. The loop owns the source for
//! its whole lifetime and never touches the queue; all it reads from the
//! engine are the status directive, the pause intent, the seek mailbox,
//! and the volume.

use crate::engine::{PlayerEngine, PlayerStatus};
use crate::error::Result;
use crate::sink::{AudioSink, SINK_BUFFER_COUNT};
use crate::source::Source;
use crate::types::TrackStats;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Pause-intent poll interval, roughly one hardware frame
const PAUSE_POLL: Duration = Duration::from_millis(17);

/// Why the render loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderOutcome {
    /// The source played to its natural end
    Finished,

    /// The status directive changed (or the engine is shutting down)
    /// before the source ended
    Interrupted,
}

/// Play `source` through `sink` until it ends or the engine interrupts
///
/// Decode errors propagate to the caller; the sink is stopped on every
/// exit path.
pub(crate) fn render_track(
    engine: &PlayerEngine,
    sink: &mut dyn AudioSink,
    source: &mut dyn Source,
) -> Result<RenderOutcome> {
    let outcome = render_inner(engine, sink, source);
    sink.stop();
    outcome
}

fn render_inner(
    engine: &PlayerEngine,
    sink: &mut dyn AudioSink,
    source: &mut dyn Source,
) -> Result<RenderOutcome> {
    sink.configure(source.sample_rate(), source.channel_count())?;
    sink.set_volume(engine.gain());

    let channels = source.channel_count() as usize;
    let mut pcm = vec![0.0f32; sink.buffer_frames() * channels];

    debug!(
        sample_rate = source.sample_rate(),
        channels,
        total_frames = source.total_frames(),
        "render loop started"
    );

    loop {
        if !engine.is_running() || engine.status() == PlayerStatus::FetchNext {
            return Ok(RenderOutcome::Interrupted);
        }

        if let Some(frame) = engine.take_pending_seek() {
            match source.seek(frame) {
                Ok(landed) => debug!(requested = frame, landed, "seek applied"),
                Err(err) => warn!(requested = frame, %err, "seek failed, ignoring"),
            }
        }

        // Paused: keep the pump alive but decode nothing, so resuming
        // picks up exactly where the source stopped
        if engine.pause_intent() {
            sink.tick();
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let slot = (0..SINK_BUFFER_COUNT).find(|&s| sink.buffer_state(s).is_ready());
        let Some(slot) = slot else {
            // Both buffers in flight: wait out one hardware frame
            sink.wait_frame();
            sink.tick();
            continue;
        };

        let frames = source.decode(&mut pcm)?;
        if frames == 0 {
            if source.done() {
                debug!("source finished");
                return Ok(RenderOutcome::Finished);
            }
            // Packet produced no audio; keep the pump moving and decode
            // again
            sink.tick();
            continue;
        }

        sink.set_volume(engine.gain());
        sink.submit(slot, &pcm[..frames * channels])?;
        sink.start()?;

        engine.publish_stats(TrackStats {
            sample_rate: source.sample_rate(),
            current_frame: source.tell(),
            total_frames: source.total_frames(),
        });

        sink.tick();
    }
}
