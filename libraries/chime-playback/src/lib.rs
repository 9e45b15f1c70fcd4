//! Platform-agnostic playback engine
//!
//! The engine keeps a mutable dual-ordering track queue, runs a fetch /
//! render state machine on a dedicated playback thread, and exposes the
//! control operations a host daemon maps onto its control surface.
//! Decoding and hardware output stay behind the [`Source`] and
//! [`AudioSink`] traits so the crate itself has no codec or device
//! dependency.
//!
//! Typical wiring:
//!
//! ```ignore
//! let engine = Arc::new(PlayerEngine::new(Box::new(open_source)));
//! let playback = {
//!     let engine = engine.clone();
//!     thread::spawn(move || engine.run(&mut sink))
//! };
//! thread::spawn({
//!     let engine = engine.clone();
//!     move || watch::power_watcher(engine, power_events)
//! });
//! ```

pub mod engine;
pub mod error;
mod queue;
mod render;
pub mod sink;
pub mod source;
pub mod types;
pub mod volume;
pub mod watch;

pub use engine::{PlayerEngine, API_VERSION};
pub use error::{PlaybackError, Result};
pub use sink::{AudioSink, BufferState, SINK_BUFFER_COUNT};
pub use source::Source;
pub use types::{
    NowPlaying, Placement, PlaybackStatus, RepeatMode, ShuffleMode, Track, TrackStats,
};
pub use volume::Volume;
pub use watch::{JackProbe, PowerEvent};
