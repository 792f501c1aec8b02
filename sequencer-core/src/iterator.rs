//! C5 — Multi-Track Iterator.
//!
//! Grounded on `examples/original_source/src/multitrack.cpp`'s
//! `MIDIMultiTrackIterator`: one cursor per track, and `next()` always picks
//! the track whose next pending event has the smallest tick, breaking ties
//! by ascending track index. Kept as a pure cursor (no borrow of the
//! `MultiTrack` held between calls) so callers can freely mutate tracks
//! between `next()` calls without fighting the borrow checker.

use crate::message::{Tick, TimedMessage};
use crate::multitrack::MultiTrack;

/// External iterator over a [`MultiTrack`]'s combined event stream.
pub struct MultiTrackIterator {
    cursors: Vec<usize>,
    enabled: Vec<bool>,
    /// Per-track tick offset (spec §3: "an optional vector of per-track
    /// tick offsets"), applied only to channel and sysex messages — never
    /// to meta, so a conductor track's tempo/time-signature/marker timing
    /// is unaffected by a performer track's shift.
    time_shift: Vec<i64>,
    shift_enabled: bool,
}

impl MultiTrackIterator {
    pub fn new(num_tracks: usize) -> Self {
        Self {
            cursors: vec![0; num_tracks],
            enabled: vec![true; num_tracks],
            time_shift: vec![0; num_tracks],
            shift_enabled: true,
        }
    }

    pub fn set_enabled(&mut self, track: usize, enabled: bool) {
        if let Some(e) = self.enabled.get_mut(track) {
            *e = enabled;
        }
    }

    pub fn is_enabled(&self, track: usize) -> bool {
        self.enabled.get(track).copied().unwrap_or(false)
    }

    /// Sets `track`'s tick offset. Grows the offset table if `track` is
    /// beyond its current length, so tracks appended after construction
    /// still default to zero shift instead of panicking.
    pub fn set_time_shift(&mut self, track: usize, shift: i64) {
        if track >= self.time_shift.len() {
            self.time_shift.resize(track + 1, 0);
        }
        self.time_shift[track] = shift;
    }

    pub fn time_shift(&self, track: usize) -> i64 {
        self.time_shift.get(track).copied().unwrap_or(0)
    }

    /// Enables or disables applying any configured offsets at all, without
    /// discarding them (spec §3's "a flag enabling their application").
    pub fn set_shift_enabled(&mut self, enabled: bool) {
        self.shift_enabled = enabled;
    }

    pub fn is_shift_enabled(&self) -> bool {
        self.shift_enabled
    }

    pub fn reset(&mut self) {
        self.cursors.iter_mut().for_each(|c| *c = 0);
    }

    /// The tick this iterator reports for `msg` on `track`: shifted
    /// (clamped to never go negative) for channel/sysex messages when
    /// shifting is enabled, raw otherwise.
    fn effective_tick(&self, track: usize, msg: &TimedMessage) -> Tick {
        let raw = msg.tick();
        if !self.shift_enabled || !(msg.is_channel() || msg.is_sysex()) {
            return raw;
        }
        let shift = self.time_shift(track);
        (raw as i64 + shift).max(0) as Tick
    }

    /// Moves every cursor to the first event at or after `target_tick`
    /// (un-shifted; `target_tick` is in track-tick space).
    pub fn seek(&mut self, mt: &MultiTrack, target_tick: Tick) {
        for (idx, cursor) in self.cursors.iter_mut().enumerate() {
            if let Ok(track) = mt.track(idx) {
                *cursor = track.events().partition_point(|e| e.tick() < target_tick);
            }
        }
    }

    /// The next pending tick across all enabled tracks, in effective
    /// (shifted) space, without consuming it.
    pub fn peek_tick(&self, mt: &MultiTrack) -> Option<Tick> {
        self.next_track(mt).map(|(_, tick)| tick)
    }

    /// Index of the enabled track whose next pending event has the
    /// smallest effective tick, and that tick. Ties broken by ascending
    /// track index.
    fn next_track(&self, mt: &MultiTrack) -> Option<(usize, Tick)> {
        let mut best: Option<(usize, Tick)> = None;
        for (idx, &cursor) in self.cursors.iter().enumerate() {
            if !self.enabled.get(idx).copied().unwrap_or(false) {
                continue;
            }
            let Ok(track) = mt.track(idx) else { continue };
            let Some(event) = track.events().get(cursor) else {
                continue;
            };
            let tick = self.effective_tick(idx, event);
            match best {
                Some((_, best_tick)) if tick >= best_tick => {}
                _ => best = Some((idx, tick)),
            }
        }
        best
    }

    /// Returns the next `(track_index, message)` pair in merged order and
    /// advances that track's cursor, or `None` once every enabled track is
    /// exhausted. The returned message's tick is the effective tick.
    pub fn next(&mut self, mt: &MultiTrack) -> Option<(usize, TimedMessage)> {
        let (idx, effective) = self.next_track(mt)?;
        let track = mt.track(idx).ok()?;
        let cursor = self.cursors[idx];
        let mut msg = track.events().get(cursor)?.clone();
        self.cursors[idx] = cursor + 1;
        msg.set_tick(effective);
        Some((idx, msg))
    }

    /// True once no enabled track has a pending event.
    pub fn is_exhausted(&self, mt: &MultiTrack) -> bool {
        self.next_track(mt).is_none()
    }
}
