//! C2 — Track.
//!
//! Grounded on `examples/original_source/src/multitrack.cpp`'s `MIDITrack`
//! insert/delete/interval operations and its sorted-by-tick event storage.

use std::cell::Cell;

use crate::error::{Result, SequencerError};
use crate::message::{Tick, TimedMessage};

/// How [`Track::insert_event`] should behave when an event with matching
/// identity already exists at the target tick (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertMode {
    /// Always append; never looks for an existing match.
    Insert,
    /// Overwrite an existing matching event; fails with `InvalidEdit` if
    /// none is found.
    Replace,
    /// Replace if a match exists, otherwise insert.
    InsertOrReplace,
}

/// Cached summary of a track's content, recomputed lazily (spec §4.1).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackStatus {
    pub has_channel_events: bool,
    pub has_meta: bool,
    /// `Some(channel)` if every channel event on the track uses the same
    /// channel; `None` if there are no channel events, or more than one
    /// channel appears.
    pub uniform_channel: Option<u8>,
}

/// Ordered sequence of timed messages for one logical voice (spec §3/§4.1).
///
/// Events are kept sorted by `(tick, is_channel)` so that, within one tick,
/// meta events precede channel events (program-change-before-its-first-note);
/// within one `(tick, is_channel)` bucket, insertion order is preserved.
#[derive(Clone, Debug)]
pub struct Track {
    events: Vec<TimedMessage>,
    end_time: Tick,
    status_cache: Cell<Option<TrackStatus>>,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            end_time: 0,
            status_cache: Cell::new(Some(TrackStatus::default())),
        }
    }

    pub fn events(&self) -> &[TimedMessage] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        // SPEC_FULL supplement 5: a track is "empty" only if it has no
        // content at all, not merely no events at tick 0.
        self.events.is_empty() && self.end_time == 0
    }

    pub fn end_time(&self) -> Tick {
        self.end_time
    }

    /// Sets the track's end time. Must be >= the last event's tick.
    pub fn set_end_time(&mut self, end_time: Tick) -> Result<()> {
        let last = self.events.last().map(|e| e.tick()).unwrap_or(0);
        if end_time < last {
            return Err(SequencerError::BadRange {
                start: end_time,
                end: last,
            });
        }
        self.end_time = end_time;
        Ok(())
    }

    /// Shrinks the end time down to the last event's tick.
    pub fn shrink_end_time(&mut self) {
        self.end_time = self.events.last().map(|e| e.tick()).unwrap_or(0);
    }

    fn mark_dirty(&self) {
        self.status_cache.set(None);
    }

    /// The cached status bitmap, recomputing it if dirty.
    pub fn status(&self) -> TrackStatus {
        if let Some(s) = self.status_cache.get() {
            return s;
        }
        let mut has_channel_events = false;
        let mut has_meta = false;
        let mut uniform_channel: Option<Option<u8>> = None;
        for e in &self.events {
            if e.is_channel() {
                has_channel_events = true;
                let ch = e.channel();
                match uniform_channel {
                    None => uniform_channel = Some(ch),
                    Some(existing) if existing != ch => uniform_channel = Some(None),
                    _ => {}
                }
            } else if e.is_meta() {
                has_meta = true;
            }
        }
        let status = TrackStatus {
            has_channel_events,
            has_meta,
            uniform_channel: uniform_channel.flatten(),
        };
        self.status_cache.set(Some(status));
        status
    }

    fn sort_key(msg: &TimedMessage) -> (Tick, bool) {
        (msg.tick(), msg.is_channel())
    }

    /// Position just after the last existing event with a sort key <= the
    /// given one — i.e. where a newly-inserted event with that key should
    /// land to preserve insertion order among ties (spec §4.2's "ascending
    /// track index" ordering relies on the analogous per-track guarantee).
    fn append_position(&self, key: (Tick, bool)) -> usize {
        self.events.partition_point(|e| Self::sort_key(e) <= key)
    }

    /// A message "matches" an existing one for replace purposes if it would
    /// overwrite the same logical slot: same tick, same status class, and
    /// (for messages that carry one) the same key/controller/meta-type.
    fn matches_identity(a: &TimedMessage, b: &TimedMessage) -> bool {
        if a.tick() != b.tick() {
            return false;
        }
        if a.is_channel() && b.is_channel() {
            if a.status() & 0xF0 != b.status() & 0xF0 || a.channel() != b.channel() {
                return false;
            }
            // Note on/off, poly pressure, and CC carry identity in data1;
            // program change and channel pressure don't use data1 at all.
            return !matches!(a.status() & 0xF0, 0x80 | 0x90 | 0xA0 | 0xB0) || a.data1() == b.data1();
        }
        if a.is_meta() && b.is_meta() {
            return a.data1() == b.data1();
        }
        a.is_sysex() && b.is_sysex()
    }

    fn find_match(&self, msg: &TimedMessage) -> Option<usize> {
        self.events.iter().position(|e| Self::matches_identity(e, msg))
    }

    /// Inserts `msg` according to `mode` (spec §4.1).
    pub fn insert_event(&mut self, msg: TimedMessage, mode: InsertMode) -> Result<()> {
        match mode {
            InsertMode::Insert => self.do_insert(msg),
            InsertMode::Replace => {
                let idx = self.find_match(&msg).ok_or_else(|| {
                    SequencerError::InvalidEdit(
                        "replace: no existing event matches identity".into(),
                    )
                })?;
                self.events[idx] = msg;
                self.mark_dirty();
            }
            InsertMode::InsertOrReplace => {
                if let Some(idx) = self.find_match(&msg) {
                    self.events[idx] = msg;
                    self.mark_dirty();
                } else {
                    self.do_insert(msg);
                }
            }
        }
        if self.end_time < self.events.last().map(|e| e.tick()).unwrap_or(0) {
            self.end_time = self.events.last().map(|e| e.tick()).unwrap_or(0);
        }
        Ok(())
    }

    fn do_insert(&mut self, msg: TimedMessage) {
        let pos = self.append_position(Self::sort_key(&msg));
        self.events.insert(pos, msg);
        self.mark_dirty();
    }

    /// Removes the first event that is byte-for-byte equal to `msg`.
    /// Returns whether anything was removed.
    pub fn delete_event(&mut self, msg: &TimedMessage) -> bool {
        if let Some(idx) = self.events.iter().position(|e| e == msg) {
            self.events.remove(idx);
            self.mark_dirty();
            true
        } else {
            false
        }
    }

    /// Inserts a note-on and its paired note-off `length` ticks later.
    pub fn insert_note(&mut self, on: TimedMessage, length: Tick, mode: InsertMode) -> Result<()> {
        if !on.is_note_on() {
            return Err(SequencerError::InvalidEdit(
                "insert_note requires a note-on message".into(),
            ));
        }
        let channel = on.channel().unwrap_or(0);
        let key = on.data1();
        let off_tick = on.tick().saturating_add(length);
        self.insert_event(on, mode)?;
        self.insert_event(
            TimedMessage::note_off(channel, key, off_tick),
            InsertMode::Insert,
        )?;
        Ok(())
    }

    /// Removes a note-on and the first matching note-off at or after it.
    pub fn delete_note(&mut self, on: &TimedMessage) -> Result<()> {
        if !on.is_note_on() {
            return Err(SequencerError::InvalidEdit(
                "delete_note requires a note-on message".into(),
            ));
        }
        let channel = on.channel().unwrap_or(0);
        let key = on.data1();
        if !self.delete_event(on) {
            return Err(SequencerError::InvalidEdit(
                "delete_note: matching note-on not found".into(),
            ));
        }
        if let Some(idx) = self.events.iter().position(|e| {
            e.tick() >= on.tick() && e.is_note_off() && e.channel() == Some(channel) && e.data1() == key
        }) {
            self.events.remove(idx);
            self.mark_dirty();
        }
        Ok(())
    }

    fn check_range(&self, start: Tick, end: Tick) -> Result<()> {
        if end < start || end > self.end_time {
            return Err(SequencerError::BadRange { start, end });
        }
        Ok(())
    }

    /// Removes all events in `[start, end)` without shifting later events.
    pub fn clear_interval(&mut self, start: Tick, end: Tick) -> Result<()> {
        self.check_range(start, end)?;
        self.events.retain(|e| !(e.tick() >= start && e.tick() < end));
        self.mark_dirty();
        Ok(())
    }

    /// Removes all events in `[start, end)` and shifts every later event
    /// earlier by `end - start`.
    pub fn delete_interval(&mut self, start: Tick, end: Tick) -> Result<()> {
        self.check_range(start, end)?;
        let shift = end - start;
        self.events.retain(|e| !(e.tick() >= start && e.tick() < end));
        for e in self.events.iter_mut() {
            if e.tick() >= end {
                e.set_tick(e.tick() - shift);
            }
        }
        self.end_time = self.end_time.saturating_sub(shift);
        self.mark_dirty();
        Ok(())
    }

    /// Copies the events in `[start, end)` into `dest`, retimed so the
    /// interval's start lands at tick 0.
    pub fn make_interval(&self, start: Tick, end: Tick, dest: &mut Track) -> Result<()> {
        self.check_range(start, end)?;
        dest.events.clear();
        for e in &self.events {
            if e.tick() >= start && e.tick() < end {
                let mut copy = e.clone();
                copy.set_tick(copy.tick() - start);
                dest.events.push(copy);
            }
        }
        dest.end_time = end - start;
        dest.mark_dirty();
        Ok(())
    }

    /// Replaces `[start, start + src.end_time())` with `src`'s events,
    /// time-shifted to begin at `start`. When `include_sysex` is false,
    /// sysex events in `src` are skipped (spec §4.1's `replace-interval`
    /// sysex flag).
    pub fn replace_interval(&mut self, start: Tick, src: &Track, include_sysex: bool) -> Result<()> {
        let len = src.end_time();
        let end = start.saturating_add(len);
        if self.end_time != 0 {
            self.check_range(start, end.min(self.end_time.max(end)))?;
        }
        self.events.retain(|e| !(e.tick() >= start && e.tick() < end));
        for e in src.events() {
            if e.is_sysex() && !include_sysex {
                continue;
            }
            let mut copy = e.clone();
            copy.set_tick(copy.tick() + start);
            self.events.push(copy);
        }
        self.events
            .sort_by(|a, b| Self::sort_key(a).cmp(&Self::sort_key(b)));
        self.end_time = self.end_time.max(end);
        self.mark_dirty();
        Ok(())
    }

    /// Rescales every event tick (and the end time) by `new_cpb / old_cpb`,
    /// rounding to nearest (spec §3, Multi-Track resolution change).
    pub(crate) fn rescale(&mut self, old_cpb: u32, new_cpb: u32) {
        let rescale_tick = |t: Tick| -> Tick {
            ((t as u64 * new_cpb as u64 + old_cpb as u64 / 2) / old_cpb as u64) as Tick
        };
        for e in self.events.iter_mut() {
            let t = rescale_tick(e.tick());
            e.set_tick(t);
        }
        self.end_time = rescale_tick(self.end_time);
        self.mark_dirty();
    }
}
