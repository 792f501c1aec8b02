//! C4 — Multi-Track.
//!
//! Grounded on `examples/original_source/src/multitrack.cpp`'s
//! `MIDIMultiTrack`: an ordered vector of tracks sharing one clocks-per-beat
//! resolution, with a rescale operation that retimes every track when the
//! resolution changes (e.g. loading a score authored at a different
//! division).

use crate::error::{Result, SequencerError};
use crate::message::Tick;
use crate::track::Track;

/// A set of tracks sharing one tick resolution (spec §3/§4.2).
///
/// By convention track 0 is the conductor track (tempo/time-signature meta
/// events, no channel events); this struct doesn't enforce that, it only
/// provides the storage and resolution-rescaling machinery the engine and
/// iterator build on.
pub struct MultiTrack {
    tracks: Vec<Track>,
    clocks_per_beat: u32,
}

impl MultiTrack {
    /// `clocks_per_beat` must be nonzero; it's the SMF "division" concept,
    /// expressed without any dependency on SMF parsing.
    pub fn new(clocks_per_beat: u32) -> Self {
        debug_assert!(clocks_per_beat > 0);
        Self {
            tracks: Vec::new(),
            clocks_per_beat,
        }
    }

    pub fn clocks_per_beat(&self) -> u32 {
        self.clocks_per_beat
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Result<&Track> {
        self.tracks.get(index).ok_or(SequencerError::InvalidTrack(index))
    }

    pub fn track_mut(&mut self, index: usize) -> Result<&mut Track> {
        self.tracks
            .get_mut(index)
            .ok_or(SequencerError::InvalidTrack(index))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Appends a new, empty track and returns its index.
    pub fn append_track(&mut self) -> usize {
        self.tracks.push(Track::new());
        self.tracks.len() - 1
    }

    /// Inserts a (possibly already-populated) track at `index`, shifting
    /// later tracks up by one.
    pub fn insert_track(&mut self, index: usize, track: Track) -> Result<()> {
        if index > self.tracks.len() {
            return Err(SequencerError::InvalidTrack(index));
        }
        self.tracks.insert(index, track);
        Ok(())
    }

    pub fn delete_track(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(SequencerError::InvalidTrack(index));
        }
        Ok(self.tracks.remove(index))
    }

    /// The latest end time across all tracks; the score's overall length.
    pub fn end_time(&self) -> Tick {
        self.tracks.iter().map(Track::end_time).max().unwrap_or(0)
    }

    /// Rescales every track's events to a new clocks-per-beat resolution,
    /// rounding each tick to the nearest value under the new resolution.
    pub fn set_clocks_per_beat(&mut self, new_cpb: u32) {
        debug_assert!(new_cpb > 0);
        if new_cpb == self.clocks_per_beat {
            return;
        }
        for track in self.tracks.iter_mut() {
            track.rescale(self.clocks_per_beat, new_cpb);
        }
        self.clocks_per_beat = new_cpb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TimedMessage;
    use crate::track::InsertMode;

    #[test]
    fn append_and_index_tracks() {
        let mut mt = MultiTrack::new(480);
        let idx = mt.append_track();
        assert_eq!(idx, 0);
        assert_eq!(mt.num_tracks(), 1);
        assert!(mt.track(0).is_ok());
        assert!(mt.track(1).is_err());
    }

    #[test]
    fn end_time_is_max_across_tracks() {
        let mut mt = MultiTrack::new(480);
        mt.append_track();
        mt.append_track();
        mt.track_mut(0)
            .unwrap()
            .insert_event(TimedMessage::note_on(0, 60, 100, 100), InsertMode::Insert)
            .unwrap();
        mt.track_mut(0).unwrap().set_end_time(960).unwrap();
        mt.track_mut(1).unwrap().set_end_time(480).unwrap();
        assert_eq!(mt.end_time(), 960);
    }

    #[test]
    fn rescale_updates_resolution_and_ticks() {
        let mut mt = MultiTrack::new(480);
        mt.append_track();
        mt.track_mut(0)
            .unwrap()
            .insert_event(TimedMessage::note_on(0, 60, 100, 480), InsertMode::Insert)
            .unwrap();
        mt.set_clocks_per_beat(960);
        assert_eq!(mt.clocks_per_beat(), 960);
        assert_eq!(mt.track(0).unwrap().events()[0].tick(), 960);
    }

    #[test]
    fn delete_track_removes_and_returns_it() {
        let mut mt = MultiTrack::new(480);
        mt.append_track();
        mt.append_track();
        let removed = mt.delete_track(0).unwrap();
        assert!(removed.is_empty());
        assert_eq!(mt.num_tracks(), 1);
    }
}
