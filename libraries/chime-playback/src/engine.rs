//! Player engine and state machine
//!
//! `PlayerEngine` owns the queue store and the control state shared between
//! the playback thread, the watcher threads, and the control surface. The
//! playback thread runs [`PlayerEngine::run`]; every other thread only
//! calls the short-lived control methods.
//!
//! The state machine has two directives: `Playing` (the render loop owns
//! the audio path) and `FetchNext` (the playback thread must resolve the
//! cursor and start a new track). Pause is deliberately not a state; it is
//! an orthogonal intent flag the render loop polls, so pausing never tears
//! down the decoder.

use crate::error::{PlaybackError, Result};
use crate::queue::QueueState;
use crate::render::{self, RenderOutcome};
use crate::sink::AudioSink;
use crate::source::Source;
use crate::types::{
    NowPlaying, Placement, PlaybackStatus, RepeatMode, ShuffleMode, Track, TrackStats,
};
use crate::volume::Volume;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Control-surface protocol version
pub const API_VERSION: u32 = 1;

/// Poll interval of the playback thread while the queue is empty
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Directive for the playback thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerStatus {
    /// The render loop owns the audio path for the captured track
    Playing,

    /// The playback thread must resolve the cursor and start a new track
    FetchNext,
}

impl PlayerStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Playing,
            _ => Self::FetchNext,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Playing => 0,
            Self::FetchNext => 1,
        }
    }
}

/// Factory producing an open [`Source`] for a track path
pub type SourceFactory = dyn Fn(&Path) -> Result<Box<dyn Source>> + Send + Sync;

/// Existence check applied to enqueued paths
pub type FileCheck = dyn Fn(&Path) -> bool + Send + Sync;

/// Shared playback engine
///
/// Constructed once by the host, wrapped in an `Arc`, and handed to the
/// playback thread, the watchers, and the control surface. The queue mutex
/// is never held across decode or hardware calls.
pub struct PlayerEngine {
    queue: Mutex<QueueState>,
    status: AtomicU8,
    pause_intent: AtomicBool,
    running: AtomicBool,
    source_live: AtomicBool,
    repeat: AtomicU8,
    volume: Mutex<Volume>,
    pending_seek: Mutex<Option<u64>>,
    open: Box<SourceFactory>,
    file_check: Box<FileCheck>,
}

impl PlayerEngine {
    /// Create an engine that opens sources through `open` and validates
    /// enqueued paths against the filesystem
    pub fn new(open: Box<SourceFactory>) -> Self {
        Self::with_file_check(open, Box::new(|path: &Path| path.exists()))
    }

    /// Create an engine with an injected path-existence check
    pub fn with_file_check(open: Box<SourceFactory>, file_check: Box<FileCheck>) -> Self {
        Self {
            queue: Mutex::new(QueueState::new()),
            status: AtomicU8::new(PlayerStatus::FetchNext.as_u8()),
            pause_intent: AtomicBool::new(false),
            running: AtomicBool::new(true),
            source_live: AtomicBool::new(false),
            repeat: AtomicU8::new(repeat_to_u8(RepeatMode::Off)),
            volume: Mutex::new(Volume::default()),
            pending_seek: Mutex::new(None),
            open,
            file_check,
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap()
    }

    pub(crate) fn status(&self) -> PlayerStatus {
        PlayerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Must be called while holding the queue lock when the new directive
    /// depends on queue state, so a concurrent mutation cannot clobber it
    fn set_status(&self, status: PlayerStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    /// True until [`shutdown`](Self::shutdown) is called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the playback thread and anything polling `is_running`
    pub fn shutdown(&self) {
        info!("engine shutdown requested");
        self.running.store(false, Ordering::Release);
    }

    /// Current pause intent
    pub fn pause_intent(&self) -> bool {
        self.pause_intent.load(Ordering::Acquire)
    }

    /// Write the pause intent flag
    ///
    /// Each caller owns exactly one event that justifies its write (user
    /// command, sleep notification, jack transition), so writers never
    /// race over the same event.
    pub fn set_pause_intent(&self, paused: bool) {
        self.pause_intent.store(paused, Ordering::Release);
    }

    pub(crate) fn source_live(&self) -> bool {
        self.source_live.load(Ordering::Acquire)
    }

    // --- queue operations ---

    /// Number of tracks in the linear playlist
    pub fn size(&self) -> usize {
        self.lock_queue().len()
    }

    /// Read the linear playlist entry at `index`
    pub fn get_item(&self, index: usize) -> Result<Track> {
        self.lock_queue().get(index)
    }

    /// Cursor position in the active list
    pub fn position(&self) -> usize {
        self.lock_queue().position()
    }

    /// Validate and insert a track
    ///
    /// The path must be absolute and pass the existence check. Insertion
    /// never interrupts the playing track; if the queue was empty the
    /// playback thread picks the track up on its next fetch poll.
    pub fn enqueue(&self, path: impl Into<PathBuf>, placement: Placement) -> Result<()> {
        let path = path.into();
        if !path.is_absolute() || !(self.file_check)(&path) {
            return Err(PlaybackError::InvalidPath(path));
        }

        debug!(path = %path.display(), ?placement, "enqueue");
        self.lock_queue().enqueue(Track::new(path), placement);
        Ok(())
    }

    /// Remove the linear playlist entry at `index`
    ///
    /// Removing the track under the cursor interrupts it and triggers a
    /// fetch of whatever slides into the cursor slot.
    pub fn remove(&self, index: usize) -> Result<()> {
        let mut queue = self.lock_queue();
        if queue.remove_at(index)? {
            self.set_status(PlayerStatus::FetchNext);
        }
        Ok(())
    }

    /// Drop every queued track and stop playback
    pub fn clear_queue(&self) {
        let mut queue = self.lock_queue();
        queue.clear();
        queue.set_current(None);
        queue.clear_stats();
        self.set_status(PlayerStatus::FetchNext);
    }

    /// Relocate a linear playlist entry; out-of-range sources are ignored
    /// and destinations are clamped
    pub fn move_queue_item(&self, src: usize, dst: usize) {
        self.lock_queue().move_item(src, dst);
    }

    /// Jump playback to the linear playlist entry at `index`
    ///
    /// Resolved through the shuffle mirror when shuffle is active.
    /// Selecting the entry already under the cursor is a no-op and does
    /// not restart the track.
    pub fn select(&self, index: usize) {
        let mut queue = self.lock_queue();
        if queue.select(index) {
            self.set_pause_intent(false);
            self.set_status(PlayerStatus::FetchNext);
        }
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.lock_queue().shuffle_mode()
    }

    /// Switch queue ordering without interrupting the playing track
    pub fn set_shuffle_mode(&self, mode: ShuffleMode) {
        self.lock_queue().set_shuffle(mode);
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        repeat_from_u8(self.repeat.load(Ordering::Acquire))
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.repeat.store(repeat_to_u8(mode), Ordering::Release);
    }

    // --- transport ---

    /// Clear pause intent; the render loop resumes within one poll tick
    pub fn play(&self) {
        self.set_pause_intent(false);
    }

    /// Set pause intent; decoder and cursor state are untouched
    pub fn pause(&self) {
        self.set_pause_intent(true);
    }

    /// Advance the cursor and fetch
    ///
    /// Wrapping past the end with `RepeatMode::Off` loads the first track
    /// paused instead of looping audibly; every other case resumes.
    pub fn next(&self) {
        let mut queue = self.lock_queue();
        if queue.active_len() == 0 {
            return;
        }
        let wrapped = queue.next();
        let stop = wrapped && self.repeat_mode() == RepeatMode::Off;
        self.set_pause_intent(stop);
        self.set_status(PlayerStatus::FetchNext);
    }

    /// Retreat the cursor (wrapping to the last entry) and fetch
    pub fn prev(&self) {
        let mut queue = self.lock_queue();
        if queue.active_len() == 0 {
            return;
        }
        queue.prev();
        self.set_pause_intent(false);
        self.set_status(PlayerStatus::FetchNext);
    }

    /// Coarse status for control-surface callers
    pub fn playback_status(&self) -> PlaybackStatus {
        if !self.source_live() {
            PlaybackStatus::Stopped
        } else if self.pause_intent() {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        }
    }

    /// Identity and decode position of the playing track
    ///
    /// Fails with `NotPlaying` unless a source is live. The snapshot is
    /// weakly consistent with the render loop: stats may lag the hardware
    /// by one buffer.
    pub fn current_queue_item(&self) -> Result<NowPlaying> {
        if !self.source_live() {
            return Err(PlaybackError::NotPlaying);
        }
        self.lock_queue()
            .now_playing()
            .ok_or(PlaybackError::NotPlaying)
    }

    /// Request a seek to an absolute frame in the playing track
    ///
    /// Best effort: the render loop applies it on its next iteration and
    /// logs (rather than surfaces) decoder seek failures.
    pub fn seek(&self, frame: u64) -> Result<()> {
        if !self.source_live() {
            return Err(PlaybackError::NotPlaying);
        }
        *self.pending_seek.lock().unwrap() = Some(frame);
        Ok(())
    }

    pub(crate) fn take_pending_seek(&self) -> Option<u64> {
        self.pending_seek.lock().unwrap().take()
    }

    /// Volume level (0-100)
    pub fn volume(&self) -> u8 {
        self.volume.lock().unwrap().level()
    }

    /// Set the volume level (clamped to 100)
    pub fn set_volume(&self, level: u8) {
        self.volume.lock().unwrap().set_level(level);
    }

    /// Linear gain for the sink, derived from the dB volume curve
    pub fn gain(&self) -> f32 {
        self.volume.lock().unwrap().gain()
    }

    pub(crate) fn publish_stats(&self, stats: TrackStats) {
        self.lock_queue().set_stats(stats);
    }

    // --- playback thread ---

    /// Playback thread body: fetch tracks and render them until shutdown
    ///
    /// Runs the render loop synchronously, so the whole audio path lives
    /// on one thread. Returns when [`shutdown`](Self::shutdown) is called.
    pub fn run(&self, sink: &mut dyn AudioSink) {
        info!("playback thread started");

        while self.is_running() {
            if self.status() != PlayerStatus::FetchNext {
                thread::sleep(IDLE_POLL);
                continue;
            }

            let track = {
                let mut queue = self.lock_queue();
                queue.clamp_position();
                match queue.track_at_cursor() {
                    Some(track) => {
                        queue.set_current(Some(track.clone()));
                        // Directive flips to Playing inside the lock so a
                        // concurrent queue mutation cannot lose its fetch
                        // request
                        self.set_status(PlayerStatus::Playing);
                        track
                    }
                    None => {
                        queue.set_current(None);
                        queue.clear_stats();
                        drop(queue);
                        thread::sleep(IDLE_POLL);
                        continue;
                    }
                }
            };

            debug!(path = %track.path().display(), "fetching track");
            let mut source = match (self.open)(track.path()) {
                Ok(source) => source,
                Err(err) => {
                    warn!(path = %track.path().display(), %err, "open failed, evicting");
                    self.evict(&track);
                    continue;
                }
            };

            self.publish_stats(TrackStats {
                sample_rate: source.sample_rate(),
                current_frame: 0,
                total_frames: source.total_frames(),
            });
            self.source_live.store(true, Ordering::Release);

            let outcome = render::render_track(self, sink, source.as_mut());

            self.source_live.store(false, Ordering::Release);
            self.lock_queue().clear_stats();
            self.take_pending_seek();

            match outcome {
                Ok(RenderOutcome::Finished) => self.advance_after_end(),
                Ok(RenderOutcome::Interrupted) => {}
                Err(err) => {
                    warn!(path = %track.path().display(), %err, "render failed, evicting");
                    self.evict(&track);
                }
            }
        }

        info!("playback thread exiting");
    }

    /// Move on after a track plays to its natural end
    fn advance_after_end(&self) {
        if self.repeat_mode() == RepeatMode::One {
            self.set_status(PlayerStatus::FetchNext);
            return;
        }

        let mut queue = self.lock_queue();
        let wrapped = queue.next();
        if wrapped && self.repeat_mode() == RepeatMode::Off {
            self.set_pause_intent(true);
        }
        self.set_status(PlayerStatus::FetchNext);
    }

    #[cfg(test)]
    pub(crate) fn force_playing(&self) {
        self.set_status(PlayerStatus::Playing);
    }

    #[cfg(test)]
    pub(crate) fn seek_unchecked(&self, frame: u64) {
        *self.pending_seek.lock().unwrap() = Some(frame);
    }

    /// Drop a track that failed to open or decode and keep going
    ///
    /// Plain value-based removal through the same dual-list bookkeeping as
    /// user removal; under duplicate paths the first occurrence goes.
    fn evict(&self, track: &Track) {
        let mut queue = self.lock_queue();
        if let Some(index) = queue.position_of(track) {
            if queue.remove_at(index).is_ok() {
                queue.clamp_position();
            }
        }
        self.set_status(PlayerStatus::FetchNext);
    }
}

fn repeat_to_u8(mode: RepeatMode) -> u8 {
    match mode {
        RepeatMode::Off => 0,
        RepeatMode::One => 1,
        RepeatMode::All => 2,
    }
}

fn repeat_from_u8(raw: u8) -> RepeatMode {
    match raw {
        1 => RepeatMode::One,
        2 => RepeatMode::All,
        _ => RepeatMode::Off,
    }
}
