//! C3 — Note-Activity Matrix.
//!
//! Grounded on `examples/original_source/include/matrix.h`'s per-channel
//! note-on counters and damper (sustain) flag, used to reconstruct an
//! all-notes-off sequence without trusting that every note-on was paired
//! with a note-off by the score (stuck notes after a seek or an edit).

use crate::message::{Tick, TimedMessage, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_SUSTAIN};

const NUM_CHANNELS: usize = 16;
const NUM_KEYS: usize = 128;

/// Tracks which (channel, key) pairs currently have an unmatched note-on,
/// plus sustain-pedal state per channel.
///
/// The matrix is driven purely by [`NoteActivityMatrix::process`]; it never
/// inspects a `Track` directly, so it works the same whether events arrive
/// from real-time dispatch or from a `MultiTrackIterator` replay during
/// seek reconstruction (spec §4.4 rule 4, §4.3).
#[derive(Clone)]
pub struct NoteActivityMatrix {
    /// `counts[channel][key]` — normally 0 or 1, but kept as a count so a
    /// duplicate note-on (no intervening note-off) doesn't go negative when
    /// the first note-off arrives.
    counts: [[u8; NUM_KEYS]; NUM_CHANNELS],
    sustain: [bool; NUM_CHANNELS],
}

impl Default for NoteActivityMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteActivityMatrix {
    pub fn new() -> Self {
        Self {
            counts: [[0; NUM_KEYS]; NUM_CHANNELS],
            sustain: [false; NUM_CHANNELS],
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Updates the matrix for one dispatched message. Non-note, non-CC
    /// messages are ignored.
    pub fn process(&mut self, msg: &TimedMessage) {
        let Some(channel) = msg.channel() else {
            return;
        };
        let ch = channel as usize;
        if msg.is_note_on() && msg.data2() > 0 {
            let key = msg.data1() as usize;
            self.counts[ch][key] = self.counts[ch][key].saturating_add(1);
        } else if msg.is_note_off() {
            let key = msg.data1() as usize;
            self.counts[ch][key] = self.counts[ch][key].saturating_sub(1);
        } else if msg.is_control_change() {
            let controller = msg.data1();
            if controller == CC_SUSTAIN {
                self.sustain[ch] = msg.data2() >= 64;
            } else if controller == CC_ALL_SOUND_OFF || controller == CC_ALL_NOTES_OFF {
                self.counts[ch] = [0; NUM_KEYS];
                self.sustain[ch] = false;
            }
            // CC 120-127 other than these two are channel-mode messages this
            // matrix doesn't need to track further (SPEC_FULL supplement 1).
        }
    }

    pub fn is_sounding(&self, channel: u8, key: u8) -> bool {
        self.counts[channel as usize & 0x0F][key as usize & 0x7F] > 0
    }

    pub fn is_sustained(&self, channel: u8) -> bool {
        self.sustain[channel as usize & 0x0F]
    }

    pub fn any_sounding(&self) -> bool {
        self.counts.iter().any(|row| row.iter().any(|&c| c > 0))
    }

    /// Every `(channel, key)` pair with a currently-unmatched note-on.
    pub fn sounding_notes(&self) -> Vec<(u8, u8)> {
        let mut out = Vec::new();
        for ch in 0..NUM_CHANNELS {
            for key in 0..NUM_KEYS {
                if self.counts[ch][key] > 0 {
                    out.push((ch as u8, key as u8));
                }
            }
        }
        out
    }

    /// Builds the message sequence needed to silence every currently
    /// sounding note and release the damper pedal, all stamped at `tick`.
    ///
    /// Per SPEC_FULL supplement 2, a CC 64 (sustain) value-0 message is
    /// always appended for a channel whose damper is down, even if no notes
    /// are currently sounding on it — a sustained-but-released key has
    /// already decremented its note count to zero, but would still ring out
    /// on real hardware until the pedal lifts.
    pub fn all_notes_off(&self, tick: Tick) -> Vec<TimedMessage> {
        let mut out = Vec::new();
        for ch in 0..NUM_CHANNELS {
            for key in 0..NUM_KEYS {
                if self.counts[ch][key] > 0 {
                    out.push(TimedMessage::note_off(ch as u8, key as u8, tick));
                }
            }
            if self.sustain[ch] {
                out.push(TimedMessage::control_change(ch as u8, CC_SUSTAIN, 0, tick));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_note_on_and_off() {
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::note_on(0, 60, 100, 0));
        assert!(m.is_sounding(0, 60));
        m.process(&TimedMessage::note_off(0, 60, 10));
        assert!(!m.is_sounding(0, 60));
    }

    #[test]
    fn zero_velocity_note_on_counts_as_off() {
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::note_on(0, 60, 100, 0));
        m.process(&TimedMessage::note_on(0, 60, 0, 5));
        assert!(!m.is_sounding(0, 60));
    }

    #[test]
    fn all_notes_off_cc_clears_channel() {
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::note_on(0, 60, 100, 0));
        m.process(&TimedMessage::note_on(0, 64, 100, 0));
        m.process(&TimedMessage::control_change(0, CC_ALL_NOTES_OFF, 0, 5));
        assert!(!m.any_sounding());
    }

    #[test]
    fn sustain_pedal_emits_release_even_without_sounding_notes() {
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::control_change(0, CC_SUSTAIN, 127, 0));
        m.process(&TimedMessage::note_on(0, 60, 100, 0));
        m.process(&TimedMessage::note_off(0, 60, 10));
        assert!(!m.any_sounding());
        let seq = m.all_notes_off(20);
        assert_eq!(seq.len(), 1);
        assert!(seq[0].is_control_change());
        assert_eq!(seq[0].data1(), CC_SUSTAIN);
        assert_eq!(seq[0].data2(), 0);
    }

    #[test]
    fn controller_above_122_does_not_store_as_current_value() {
        // CC 123 (all-notes-off) clears rather than being tracked as a
        // "current controller value" (SPEC_FULL supplement 1).
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::note_on(0, 60, 100, 0));
        m.process(&TimedMessage::control_change(0, CC_ALL_NOTES_OFF, 1, 5));
        assert!(!m.is_sounding(0, 60));
    }

    #[test]
    fn sounding_notes_lists_all_active_pairs() {
        let mut m = NoteActivityMatrix::new();
        m.process(&TimedMessage::note_on(1, 10, 100, 0));
        m.process(&TimedMessage::note_on(1, 20, 100, 0));
        let mut notes = m.sounding_notes();
        notes.sort();
        assert_eq!(notes, vec![(1, 10), (1, 20)]);
    }
}
