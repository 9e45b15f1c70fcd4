//! Dual-list playback queue
//!
//! The linear playlist is ground truth for user edits; the shuffled list is
//! a parallel view holding the same multiset of tracks in randomized order.
//! Every mutation to the playlist is mirrored into the shuffled list
//! (random insertion position on enqueue, first-match-by-value removal),
//! and the cursor indexes whichever list the shuffle mode selects.
//!
//! `QueueState` is a plain struct; `PlayerEngine` owns it behind the single
//! queue mutex, so every method here runs as one critical section.

use crate::error::{PlaybackError, Result};
use crate::types::{NowPlaying, Placement, ShuffleMode, Track, TrackStats};
use rand::Rng;

/// Queue store: both orderings, the cursor, and the playing-track snapshot
#[derive(Debug)]
pub(crate) struct QueueState {
    /// Linear order, as the user edited it
    playlist: Vec<Track>,

    /// Randomized mirror of `playlist`
    shuffled: Vec<Track>,

    /// Cursor into the active list; meaningless while that list is empty
    position: usize,

    /// Selects the active list
    mode: ShuffleMode,

    /// Identity of the track the render loop is playing, captured when the
    /// loop starts the track
    current: Option<Track>,

    /// Live decode position, written only by the playback thread
    stats: Option<TrackStats>,
}

impl QueueState {
    pub(crate) fn new() -> Self {
        Self {
            playlist: Vec::new(),
            shuffled: Vec::new(),
            position: 0,
            mode: ShuffleMode::Off,
            current: None,
            stats: None,
        }
    }

    /// Length of the linear playlist (shuffle state does not change this)
    pub(crate) fn len(&self) -> usize {
        self.playlist.len()
    }

    /// Read the linear playlist by index
    pub(crate) fn get(&self, index: usize) -> Result<Track> {
        self.playlist
            .get(index)
            .cloned()
            .ok_or(PlaybackError::OutOfRange(index))
    }

    pub(crate) fn shuffle_mode(&self) -> ShuffleMode {
        self.mode
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    fn active_list(&self) -> &[Track] {
        match self.mode {
            ShuffleMode::Off => &self.playlist,
            ShuffleMode::On => &self.shuffled,
        }
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active_list().len()
    }

    /// Track under the cursor in the active list
    pub(crate) fn track_at_cursor(&self) -> Option<Track> {
        self.active_list().get(self.position).cloned()
    }

    /// Pull the cursor back into bounds after removals
    pub(crate) fn clamp_position(&mut self) {
        let len = self.active_len();
        if len > 0 && self.position >= len {
            self.position = len - 1;
        }
    }

    /// Insert a track into both lists
    ///
    /// Front insertion keeps the playing track's relative position stable
    /// by shifting the cursor along with it; the shuffled mirror gets the
    /// track at a uniformly random slot (degenerate to slot 0 while the
    /// list holds at most one entry), with the same cursor-stability rule
    /// when the random slot lands at or before the cursor.
    pub(crate) fn enqueue(&mut self, track: Track, placement: Placement) {
        let was_empty = self.playlist.is_empty();

        match placement {
            Placement::Front => {
                self.playlist.insert(0, track.clone());
                if self.mode == ShuffleMode::Off && !was_empty {
                    self.position += 1;
                }
            }
            Placement::Back => self.playlist.push(track.clone()),
        }

        let len = self.shuffled.len();
        let slot = if len <= 1 {
            0
        } else {
            rand::thread_rng().gen_range(0..=len)
        };
        self.shuffled.insert(slot, track);
        if self.mode == ShuffleMode::On && !was_empty && slot <= self.position {
            self.position += 1;
        }
    }

    /// Remove the linear playlist entry at `index`
    ///
    /// The shuffled twin is located by first-match-by-value; under
    /// duplicate paths this may remove a different logical occurrence than
    /// the one at `index`. That ambiguity is inherited behavior, kept
    /// rather than papered over with synthetic entry ids.
    ///
    /// Returns `true` when the removed slot was the cursor's slot in the
    /// active list, i.e. the caller must fetch a new track.
    pub(crate) fn remove_at(&mut self, index: usize) -> Result<bool> {
        if self.playlist.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if index >= self.playlist.len() {
            return Err(PlaybackError::OutOfRange(index));
        }

        let track = self.playlist.remove(index);
        let shuffle_index = self.shuffled.iter().position(|t| *t == track);
        if let Some(si) = shuffle_index {
            self.shuffled.remove(si);
        }

        let active_index = match self.mode {
            ShuffleMode::Off => index,
            ShuffleMode::On => shuffle_index.unwrap_or(index),
        };

        if active_index == self.position {
            // Fetch handler clamps the cursor before resolving the next track
            Ok(true)
        } else {
            if active_index < self.position {
                self.position -= 1;
            }
            Ok(false)
        }
    }

    /// Linear index of the first entry equal to `track`
    pub(crate) fn position_of(&self, track: &Track) -> Option<usize> {
        self.playlist.iter().position(|t| t == track)
    }

    /// Empty both lists and reset the cursor
    pub(crate) fn clear(&mut self) {
        self.playlist.clear();
        self.shuffled.clear();
        self.position = 0;
    }

    /// Relocate `playlist[src]` to `dst` (clamped), shifting the elements
    /// in between
    ///
    /// The cursor follows the standard crossing rule while the linear list
    /// is active; with shuffle on the cursor indexes the untouched mirror
    /// and needs no adjustment.
    pub(crate) fn move_item(&mut self, src: usize, dst: usize) {
        if src >= self.playlist.len() {
            return;
        }
        let dst = dst.min(self.playlist.len() - 1);
        if src == dst {
            return;
        }

        let track = self.playlist.remove(src);
        self.playlist.insert(dst, track);

        if self.mode == ShuffleMode::Off {
            if self.position == src {
                self.position = dst;
            } else if src < dst && self.position > src && self.position <= dst {
                self.position -= 1;
            } else if dst < src && self.position >= dst && self.position < src {
                self.position += 1;
            }
        }
    }

    /// Jump the cursor to the entry at linear `index`
    ///
    /// With shuffle active the linear entry's value is resolved to its
    /// position in the shuffled list (no-op if not found). Returns `true`
    /// when the cursor actually moved.
    pub(crate) fn select(&mut self, index: usize) -> bool {
        if index >= self.playlist.len() {
            return false;
        }

        let target = match self.mode {
            ShuffleMode::Off => Some(index),
            ShuffleMode::On => {
                let value = &self.playlist[index];
                self.shuffled.iter().position(|t| t == value)
            }
        };

        match target {
            Some(pos) if pos != self.position => {
                self.position = pos;
                true
            }
            _ => false,
        }
    }

    /// Switch the active list, rebasing the cursor onto the playing
    /// track's value in the new ordering (best effort)
    pub(crate) fn set_shuffle(&mut self, mode: ShuffleMode) {
        if mode == self.mode || self.playlist.is_empty() {
            return;
        }

        let anchor = self
            .current
            .clone()
            .or_else(|| self.track_at_cursor());

        self.mode = mode;

        if let Some(anchor) = anchor {
            if let Some(pos) = self.active_list().iter().position(|t| *t == anchor) {
                self.position = pos;
            }
        }
        self.clamp_position();
    }

    /// Advance the cursor; returns `true` when it wrapped to 0
    pub(crate) fn next(&mut self) -> bool {
        let len = self.active_len();
        if len == 0 {
            return false;
        }
        if self.position + 1 < len {
            self.position += 1;
            false
        } else {
            self.position = 0;
            true
        }
    }

    /// Retreat the cursor, wrapping to the last index
    pub(crate) fn prev(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        if self.position > 0 {
            self.position -= 1;
        } else {
            self.position = len - 1;
        }
    }

    pub(crate) fn set_current(&mut self, track: Option<Track>) {
        self.current = track;
    }

    pub(crate) fn set_stats(&mut self, stats: TrackStats) {
        self.stats = Some(stats);
    }

    pub(crate) fn clear_stats(&mut self) {
        self.stats = None;
    }

    /// Snapshot of the playing track, if both identity and stats are live
    pub(crate) fn now_playing(&self) -> Option<NowPlaying> {
        match (&self.current, &self.stats) {
            (Some(track), Some(stats)) => Some(NowPlaying {
                track: track.clone(),
                stats: *stats,
            }),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    #[cfg(test)]
    pub(crate) fn shuffled(&self) -> &[Track] {
        &self.shuffled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Track {
        Track::new(format!("/music/{name}.mp3"))
    }

    fn queue_of(names: &[&str]) -> QueueState {
        let mut q = QueueState::new();
        for name in names {
            q.enqueue(track(name), Placement::Back);
        }
        q
    }

    #[test]
    fn enqueue_back_round_trip() {
        let mut q = QueueState::new();
        q.enqueue(track("a"), Placement::Back);

        assert_eq!(q.len(), 1);
        assert_eq!(q.get(0).unwrap(), track("a"));
        assert_eq!(q.get(q.len() - 1).unwrap(), track("a"));
    }

    #[test]
    fn get_out_of_range() {
        let q = queue_of(&["a"]);
        assert!(matches!(q.get(1), Err(PlaybackError::OutOfRange(1))));
    }

    #[test]
    fn mirror_holds_same_multiset() {
        let mut q = queue_of(&["a", "b", "c", "a"]);
        q.remove_at(0).unwrap();
        q.enqueue(track("d"), Placement::Front);

        assert_eq!(q.playlist().len(), q.shuffled().len());
        let mut linear: Vec<_> = q.playlist().to_vec();
        let mut mirror: Vec<_> = q.shuffled().to_vec();
        linear.sort_by(|a, b| a.path.cmp(&b.path));
        mirror.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(linear, mirror);
    }

    #[test]
    fn front_enqueue_keeps_cursor_on_same_track() {
        let mut q = queue_of(&["a", "b"]);
        q.select(1);
        let before = q.track_at_cursor().unwrap();

        q.enqueue(track("c"), Placement::Front);

        assert_eq!(q.position(), 2);
        assert_eq!(q.track_at_cursor().unwrap(), before);
    }

    #[test]
    fn front_enqueue_into_empty_queue_leaves_cursor_at_zero() {
        let mut q = QueueState::new();
        q.enqueue(track("a"), Placement::Front);
        assert_eq!(q.position(), 0);
    }

    #[test]
    fn enqueue_with_shuffle_active_keeps_cursor_value() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.set_shuffle(ShuffleMode::On);
        let before = q.track_at_cursor().unwrap();

        for i in 0..20 {
            q.enqueue(track(&format!("x{i}")), Placement::Back);
            assert_eq!(q.track_at_cursor().unwrap(), before);
        }
    }

    #[test]
    fn remove_before_cursor_shifts_it() {
        // Queue [a,b,c], cursor on b: removing a leaves the cursor on b
        let mut q = queue_of(&["a", "b", "c"]);
        q.select(1);

        let refetch = q.remove_at(0).unwrap();

        assert!(!refetch);
        assert_eq!(q.position(), 0);
        assert_eq!(q.track_at_cursor().unwrap(), track("b"));
        assert_eq!(q.playlist(), &[track("b"), track("c")]);
    }

    #[test]
    fn remove_at_cursor_requests_refetch() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.select(1);

        let refetch = q.remove_at(1).unwrap();
        assert!(refetch);
    }

    #[test]
    fn remove_after_cursor_is_invisible() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.select(1);

        let refetch = q.remove_at(2).unwrap();

        assert!(!refetch);
        assert_eq!(q.position(), 1);
        assert_eq!(q.track_at_cursor().unwrap(), track("b"));
    }

    #[test]
    fn remove_from_empty_queue() {
        let mut q = QueueState::new();
        assert!(matches!(q.remove_at(0), Err(PlaybackError::QueueEmpty)));
    }

    #[test]
    fn remove_out_of_range() {
        let mut q = queue_of(&["a"]);
        assert!(matches!(q.remove_at(3), Err(PlaybackError::OutOfRange(3))));
    }

    #[test]
    fn remove_with_shuffle_active_adjusts_shuffle_cursor() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.set_shuffle(ShuffleMode::On);
        q.select(2); // resolves c in the shuffled list
        let playing = q.track_at_cursor().unwrap();

        // Remove a linear entry that is not the playing one
        let victim_index = q.playlist().iter().position(|t| *t != playing).unwrap();
        let refetch = q.remove_at(victim_index).unwrap();

        assert!(!refetch);
        assert_eq!(q.track_at_cursor().unwrap(), playing);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut q = queue_of(&["a", "b"]);
        q.select(1);
        q.clear();

        assert_eq!(q.len(), 0);
        assert_eq!(q.active_len(), 0);
        assert_eq!(q.position(), 0);
        assert!(q.track_at_cursor().is_none());
    }

    #[test]
    fn move_forward_across_cursor() {
        // [a,b,c,d], cursor 1 (b): move(0,2) -> [b,c,a,d], cursor follows b
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.select(1);

        q.move_item(0, 2);

        assert_eq!(
            q.playlist(),
            &[track("b"), track("c"), track("a"), track("d")]
        );
        assert_eq!(q.position(), 0);
        assert_eq!(q.track_at_cursor().unwrap(), track("b"));
    }

    #[test]
    fn move_backward_across_cursor() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.select(1);

        q.move_item(3, 0);

        assert_eq!(
            q.playlist(),
            &[track("d"), track("a"), track("b"), track("c")]
        );
        assert_eq!(q.position(), 2);
        assert_eq!(q.track_at_cursor().unwrap(), track("b"));
    }

    #[test]
    fn move_cursor_entry_jumps_with_it() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.select(1);

        q.move_item(1, 3);

        assert_eq!(q.position(), 3);
        assert_eq!(q.track_at_cursor().unwrap(), track("b"));
    }

    #[test]
    fn move_preserves_cursor_value_for_all_pairs() {
        for src in 0..4 {
            for dst in 0..4 {
                for cursor in 0..4 {
                    let mut q = queue_of(&["a", "b", "c", "d"]);
                    q.select(cursor);
                    let before = q.track_at_cursor().unwrap();

                    q.move_item(src, dst);

                    assert_eq!(
                        q.track_at_cursor().unwrap(),
                        before,
                        "src={src} dst={dst} cursor={cursor}"
                    );
                }
            }
        }
    }

    #[test]
    fn move_clamps_destination() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.move_item(0, 99);
        assert_eq!(q.playlist(), &[track("b"), track("c"), track("a")]);
    }

    #[test]
    fn move_ignores_bad_source() {
        let mut q = queue_of(&["a", "b"]);
        q.move_item(5, 0);
        assert_eq!(q.playlist(), &[track("a"), track("b")]);
    }

    #[test]
    fn select_resolves_through_shuffle_mirror() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.set_shuffle(ShuffleMode::On);

        let changed = q.select(2);
        let _ = changed; // may be false if c already sits under the cursor
        assert_eq!(q.track_at_cursor().unwrap(), track("c"));
    }

    #[test]
    fn select_same_position_reports_unchanged() {
        let mut q = queue_of(&["a", "b"]);
        assert!(!q.select(0));
        assert!(q.select(1));
        assert!(!q.select(1));
    }

    #[test]
    fn select_out_of_range_is_noop() {
        let mut q = queue_of(&["a", "b"]);
        assert!(!q.select(9));
        assert_eq!(q.position(), 0);
    }

    #[test]
    fn shuffle_rebase_points_at_same_track() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.select(0);
        q.set_current(Some(track("a")));

        q.set_shuffle(ShuffleMode::On);
        assert_eq!(q.track_at_cursor().unwrap(), track("a"));

        q.set_shuffle(ShuffleMode::Off);
        assert_eq!(q.position(), 0);
        assert_eq!(q.track_at_cursor().unwrap(), track("a"));
    }

    #[test]
    fn set_shuffle_is_idempotent() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.set_shuffle(ShuffleMode::On);
        let position = q.position();
        let order: Vec<_> = q.shuffled().to_vec();

        q.set_shuffle(ShuffleMode::On);

        assert_eq!(q.position(), position);
        assert_eq!(q.shuffled(), order.as_slice());
    }

    #[test]
    fn set_shuffle_on_empty_queue_is_noop() {
        let mut q = QueueState::new();
        q.set_shuffle(ShuffleMode::On);
        assert_eq!(q.shuffle_mode(), ShuffleMode::Off);
    }

    #[test]
    fn next_wraps_to_front() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.select(2);

        assert!(q.next());
        assert_eq!(q.position(), 0);
        assert!(!q.next());
        assert_eq!(q.position(), 1);
    }

    #[test]
    fn prev_wraps_to_back() {
        let mut q = queue_of(&["a", "b", "c"]);

        q.prev();
        assert_eq!(q.position(), 2);
        q.prev();
        assert_eq!(q.position(), 1);
    }

    #[test]
    fn now_playing_requires_both_identity_and_stats() {
        let mut q = queue_of(&["a"]);
        assert!(q.now_playing().is_none());

        q.set_current(Some(track("a")));
        assert!(q.now_playing().is_none());

        q.set_stats(TrackStats {
            sample_rate: 48000,
            current_frame: 10,
            total_frames: 100,
        });
        let now = q.now_playing().unwrap();
        assert_eq!(now.track, track("a"));
        assert_eq!(now.stats.current_frame, 10);
    }

    #[test]
    fn cursor_stays_in_bounds_after_clamp() {
        let mut q = queue_of(&["a", "b", "c"]);
        q.select(2);
        q.remove_at(2).unwrap();

        q.clamp_position();
        assert!(q.position() < q.active_len());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Enqueue(u8, bool),
            Remove(usize),
            Move(usize, usize),
            Select(usize),
            SetShuffle(bool),
            Next,
            Prev,
            Clear,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..16, any::<bool>()).prop_map(|(n, front)| Op::Enqueue(n, front)),
                (0usize..20).prop_map(Op::Remove),
                (0usize..20, 0usize..20).prop_map(|(s, d)| Op::Move(s, d)),
                (0usize..20).prop_map(Op::Select),
                any::<bool>().prop_map(Op::SetShuffle),
                Just(Op::Next),
                Just(Op::Prev),
                Just(Op::Clear),
            ]
        }

        fn apply(q: &mut QueueState, op: &Op) {
            match op {
                Op::Enqueue(n, front) => {
                    let placement = if *front { Placement::Front } else { Placement::Back };
                    q.enqueue(track(&format!("t{n}")), placement);
                }
                Op::Remove(index) => {
                    let _ = q.remove_at(*index);
                    q.clamp_position();
                }
                Op::Move(src, dst) => q.move_item(*src, *dst),
                Op::Select(index) => {
                    q.select(*index);
                }
                Op::SetShuffle(on) => {
                    q.set_shuffle(if *on { ShuffleMode::On } else { ShuffleMode::Off });
                }
                Op::Next => {
                    q.next();
                }
                Op::Prev => q.prev(),
                Op::Clear => q.clear(),
            }
        }

        proptest! {
            #[test]
            fn mirror_and_cursor_invariants_hold(ops in prop::collection::vec(op_strategy(), 0..64)) {
                let mut q = QueueState::new();
                for op in &ops {
                    apply(&mut q, op);

                    // Both orderings always hold the same multiset
                    prop_assert_eq!(q.playlist().len(), q.shuffled().len());
                    let mut linear: Vec<_> = q.playlist().to_vec();
                    let mut mirror: Vec<_> = q.shuffled().to_vec();
                    linear.sort_by(|a, b| a.path.cmp(&b.path));
                    mirror.sort_by(|a, b| a.path.cmp(&b.path));
                    prop_assert_eq!(linear, mirror);

                    // The cursor is in bounds whenever the queue is
                    // non-empty (it is meaningless while empty)
                    if q.active_len() > 0 {
                        prop_assert!(q.position() < q.active_len());
                    }
                }
            }
        }
    }
}
