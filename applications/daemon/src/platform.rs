//! Desktop placeholders for platform event sources
//!
//! The watchers in `chime_playback::watch` consume a jack probe and a
//! power-event channel. Desktop builds have no portable headphone or
//! suspend notification API, so the daemon ships inert implementations;
//! embedded ports replace this module with real signal wiring.

use chime_playback::watch::{JackProbe, PowerEvent};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Probe that always reports headphones present
pub struct AlwaysPlugged;

impl JackProbe for AlwaysPlugged {
    fn plugged(&mut self) -> bool {
        true
    }
}

/// Power-event channel for the power watcher
///
/// The daemon keeps the sender alive for its whole run; dropping it on
/// shutdown cancels the watcher.
pub fn power_events() -> (Sender<PowerEvent>, Receiver<PowerEvent>) {
    unbounded()
}
