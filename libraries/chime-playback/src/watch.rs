//! Event watcher threads
//!
//! Watchers translate environment events into pause intent and nothing
//! else: they never touch the queue, the decoder, or the status directive.
//! Each watcher owns the single event it writes the flag for, which keeps
//! the flag race-free without a lock.

use crate::engine::PlayerEngine;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How often watchers re-check `is_running` while no event arrives
const WATCH_POLL: Duration = Duration::from_millis(250);

/// System power transitions relevant to playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    /// The system is about to suspend
    EnteringSleep,

    /// The system woke up again
    Resumed,
}

/// Headphone-jack presence probe
///
/// Implemented by platform wiring; the watcher only ever asks "is
/// something plugged in right now".
pub trait JackProbe: Send {
    fn plugged(&mut self) -> bool;
}

/// Watcher body: pause when the system is about to sleep
///
/// Resume is deliberately not auto-play; waking the machine should not
/// blast audio, so the pause stays until the user clears it. Runs until
/// the engine shuts down or the sender side disconnects.
pub fn power_watcher(engine: Arc<PlayerEngine>, events: Receiver<PowerEvent>) {
    info!("power watcher started");
    while engine.is_running() {
        match events.recv_timeout(WATCH_POLL) {
            Ok(PowerEvent::EnteringSleep) => {
                info!("entering sleep, pausing playback");
                engine.set_pause_intent(true);
            }
            Ok(PowerEvent::Resumed) => {
                debug!("system resumed, leaving pause for the user");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("power watcher exiting");
}

/// Watcher body: pause on headphone unplug, restore on replug
///
/// Replug restores the pause intent that was in effect before the unplug,
/// so plugging headphones back in never overrides a pause the user asked
/// for.
pub fn jack_watcher(engine: Arc<PlayerEngine>, mut probe: Box<dyn JackProbe>, interval: Duration) {
    info!("jack watcher started");
    let mut plugged = probe.plugged();
    let mut paused_before_unplug = false;

    while engine.is_running() {
        std::thread::sleep(interval);

        let now = probe.plugged();
        if now == plugged {
            continue;
        }
        plugged = now;

        if !now {
            paused_before_unplug = engine.pause_intent();
            info!("headphones unplugged, pausing");
            engine.set_pause_intent(true);
        } else if !paused_before_unplug {
            info!("headphones plugged in, resuming");
            engine.set_pause_intent(false);
        } else {
            debug!("headphones plugged in, user pause preserved");
        }
    }
    info!("jack watcher exiting");
}
