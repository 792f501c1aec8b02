//! C1 — Timed Message.
//!
//! A [`TimedMessage`] is a status byte, two data bytes, an optional owned
//! payload (sysex / meta text / tempo), and a symbolic tick. It mirrors the
//! byte layout of `examples/original_source/include/advancedsequencer.h`'s
//! `MIDITimedMessage`: everything the engine touches is a plain byte, which
//! keeps the hot dispatch path (§5) allocation-free for ordinary channel
//! messages.

use std::fmt;

/// A non-negative symbolic tick count. `u32` comfortably covers any
/// practical Standard MIDI File (division * measures never approaches
/// 2^32 for real scores).
pub type Tick = u32;

/// Sentinel meaning "no further event" (spec §3).
pub const TIME_INFINITE: Tick = Tick::MAX;

// Channel message status nibbles (low nibble holds the channel 0-15).
pub const STATUS_NOTE_OFF: u8 = 0x80;
pub const STATUS_NOTE_ON: u8 = 0x90;
pub const STATUS_POLY_PRESSURE: u8 = 0xA0;
pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
pub const STATUS_PROGRAM_CHANGE: u8 = 0xC0;
pub const STATUS_CHANNEL_PRESSURE: u8 = 0xD0;
pub const STATUS_PITCH_BEND: u8 = 0xE0;

// Non-channel statuses.
pub const STATUS_SYSEX: u8 = 0xF0;
pub const STATUS_SYSEX_ESCAPE: u8 = 0xF7;
pub const STATUS_META: u8 = 0xFF;

// Meta event types (stored in `data1` when `status == STATUS_META`).
pub const META_TRACK_NAME: u8 = 0x03;
pub const META_INSTRUMENT_NAME: u8 = 0x04;
pub const META_MARKER: u8 = 0x06;
pub const META_TEMPO: u8 = 0x51;
pub const META_TIME_SIGNATURE: u8 = 0x58;
pub const META_KEY_SIGNATURE: u8 = 0x59;
pub const META_TEXT: u8 = 0x01;

/// Synthetic, internal-only statuses. Neither is a legal MIDI status byte
/// (every real status has its high bit set), so they can never collide with
/// score content. [`TimedMessage::is_no_op`] and [`TimedMessage::is_beat_marker`]
/// are the only code that should ever look at these.
const STATUS_BEAT_MARKER: u8 = 0x00;
const STATUS_NO_OP: u8 = 0x01;

/// Standard MIDI CC numbers this crate cares about by name (spec.md
/// SPEC_FULL supplement 1/2).
pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A single scheduled MIDI event, channel message, sysex blob, or meta
/// event, plus the two internal sentinels (beat-marker, no-op) the engine
/// injects into its own event stream but never emits to hardware.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedMessage {
    status: u8,
    data1: u8,
    data2: u8,
    payload: Option<Vec<u8>>,
    tick: Tick,
}

impl TimedMessage {
    fn raw(status: u8, data1: u8, data2: u8, tick: Tick) -> Self {
        Self {
            status,
            data1,
            data2,
            payload: None,
            tick,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    /// Raw first data byte. Meaningless (and conventionally zero) unless
    /// [`Self::is_channel`] or this is a meta event's type byte.
    pub fn data1(&self) -> u8 {
        self.data1
    }

    /// Raw second data byte. Meaningless unless `is_channel()` and the
    /// message type uses two data bytes (note on/off, poly pressure, CC,
    /// pitch bend's high byte lives here).
    pub fn data2(&self) -> u8 {
        self.data2
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    // -- predicates -----------------------------------------------------

    pub fn is_channel(&self) -> bool {
        (0x80..=0xEF).contains(&self.status)
    }

    pub fn channel(&self) -> Option<u8> {
        self.is_channel().then_some(self.status & 0x0F)
    }

    fn status_nibble(&self) -> u8 {
        self.status & 0xF0
    }

    pub fn is_note_on(&self) -> bool {
        self.is_channel() && self.status_nibble() == STATUS_NOTE_ON
    }

    pub fn is_note_off(&self) -> bool {
        self.is_channel()
            && (self.status_nibble() == STATUS_NOTE_OFF
                || (self.status_nibble() == STATUS_NOTE_ON && self.data2 == 0))
    }

    pub fn is_control_change(&self) -> bool {
        self.is_channel() && self.status_nibble() == STATUS_CONTROL_CHANGE
    }

    pub fn is_program_change(&self) -> bool {
        self.is_channel() && self.status_nibble() == STATUS_PROGRAM_CHANGE
    }

    pub fn is_pitch_bend(&self) -> bool {
        self.is_channel() && self.status_nibble() == STATUS_PITCH_BEND
    }

    pub fn is_sysex(&self) -> bool {
        self.status == STATUS_SYSEX || self.status == STATUS_SYSEX_ESCAPE
    }

    pub fn is_meta(&self) -> bool {
        self.status == STATUS_META
    }

    pub fn is_tempo(&self) -> bool {
        self.is_meta() && self.data1 == META_TEMPO
    }

    pub fn is_time_signature(&self) -> bool {
        self.is_meta() && self.data1 == META_TIME_SIGNATURE
    }

    pub fn is_key_signature(&self) -> bool {
        self.is_meta() && self.data1 == META_KEY_SIGNATURE
    }

    pub fn is_marker_text(&self) -> bool {
        self.is_meta() && self.data1 == META_MARKER
    }

    pub fn is_track_name(&self) -> bool {
        self.is_meta() && self.data1 == META_TRACK_NAME
    }

    pub fn is_instrument_name(&self) -> bool {
        self.is_meta() && self.data1 == META_INSTRUMENT_NAME
    }

    pub fn is_generic_text(&self) -> bool {
        self.is_meta() && self.data1 == META_TEXT
    }

    /// Synthetic event the engine injects at every beat tick. Never
    /// produced by score content and never written to a driver.
    pub fn is_beat_marker(&self) -> bool {
        self.status == STATUS_BEAT_MARKER
    }

    /// Internal sentinel meaning "nothing happened here;" rejected
    /// immediately by `SequencerState::process` (spec §4.4 rule 1).
    pub fn is_no_op(&self) -> bool {
        self.status == STATUS_NO_OP
    }

    // -- constructors -----------------------------------------------------

    pub fn note_on(channel: u8, key: u8, velocity: u8, tick: Tick) -> Self {
        debug_assert!(channel < 16);
        Self::raw(STATUS_NOTE_ON | (channel & 0x0F), key, velocity, tick)
    }

    pub fn note_off(channel: u8, key: u8, tick: Tick) -> Self {
        debug_assert!(channel < 16);
        Self::raw(STATUS_NOTE_OFF | (channel & 0x0F), key, 0, tick)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8, tick: Tick) -> Self {
        debug_assert!(channel < 16);
        Self::raw(
            STATUS_CONTROL_CHANGE | (channel & 0x0F),
            controller,
            value,
            tick,
        )
    }

    pub fn program_change(channel: u8, program: u8, tick: Tick) -> Self {
        debug_assert!(channel < 16);
        Self::raw(STATUS_PROGRAM_CHANGE | (channel & 0x0F), program, 0, tick)
    }

    pub fn pitch_bend(channel: u8, value: i16, tick: Tick) -> Self {
        debug_assert!(channel < 16);
        let unsigned = (value as i32 + 8192) as u16;
        Self::raw(
            STATUS_PITCH_BEND | (channel & 0x0F),
            (unsigned & 0x7F) as u8,
            ((unsigned >> 7) & 0x7F) as u8,
            tick,
        )
    }

    pub fn tempo(microseconds_per_quarter: u32, tick: Tick) -> Self {
        let bytes = microseconds_per_quarter.to_be_bytes();
        Self {
            status: STATUS_META,
            data1: META_TEMPO,
            data2: 0,
            payload: Some(vec![bytes[1], bytes[2], bytes[3]]),
            tick,
        }
    }

    /// Decodes the 3-byte big-endian microseconds-per-quarter-note payload.
    /// Returns `None` if this isn't a tempo message or the payload is
    /// malformed.
    pub fn tempo_microseconds(&self) -> Option<u32> {
        if !self.is_tempo() {
            return None;
        }
        let p = self.payload.as_ref()?;
        if p.len() != 3 {
            return None;
        }
        Some(u32::from_be_bytes([0, p[0], p[1], p[2]]))
    }

    pub fn time_signature(numerator: u8, denominator_power_of_two: u8, tick: Tick) -> Self {
        Self {
            status: STATUS_META,
            data1: META_TIME_SIGNATURE,
            data2: 0,
            payload: Some(vec![numerator, denominator_power_of_two, 24, 8]),
            tick,
        }
    }

    /// `(numerator, denominator, clocks_per_metronome_click)`.
    pub fn time_signature_fields(&self) -> Option<(u8, u8, u8)> {
        if !self.is_time_signature() {
            return None;
        }
        let p = self.payload.as_ref()?;
        if p.len() < 3 {
            return None;
        }
        Some((p[0], 1u8 << p[1], p[2]))
    }

    pub fn key_signature(sharps_flats: i8, is_minor: bool, tick: Tick) -> Self {
        Self {
            status: STATUS_META,
            data1: META_KEY_SIGNATURE,
            data2: 0,
            payload: Some(vec![sharps_flats as u8, is_minor as u8]),
            tick,
        }
    }

    pub fn key_signature_fields(&self) -> Option<(i8, bool)> {
        if !self.is_key_signature() {
            return None;
        }
        let p = self.payload.as_ref()?;
        if p.len() < 2 {
            return None;
        }
        Some((p[0] as i8, p[1] != 0))
    }

    fn meta_text(meta_type: u8, text: &str, tick: Tick) -> Self {
        Self {
            status: STATUS_META,
            data1: meta_type,
            data2: 0,
            payload: Some(text.as_bytes().to_vec()),
            tick,
        }
    }

    pub fn marker_text(text: &str, tick: Tick) -> Self {
        Self::meta_text(META_MARKER, text, tick)
    }

    pub fn track_name(text: &str, tick: Tick) -> Self {
        Self::meta_text(META_TRACK_NAME, text, tick)
    }

    pub fn instrument_name(text: &str, tick: Tick) -> Self {
        Self::meta_text(META_INSTRUMENT_NAME, text, tick)
    }

    pub fn generic_text(text: &str, tick: Tick) -> Self {
        Self::meta_text(META_TEXT, text, tick)
    }

    pub fn text(&self) -> Option<&str> {
        if !self.is_meta() {
            return None;
        }
        self.payload
            .as_ref()
            .and_then(|p| std::str::from_utf8(p).ok())
    }

    pub fn sysex(bytes: Vec<u8>, tick: Tick) -> Self {
        Self {
            status: STATUS_SYSEX,
            data1: 0,
            data2: 0,
            payload: Some(bytes),
            tick,
        }
    }

    pub fn beat_marker(tick: Tick) -> Self {
        Self::raw(STATUS_BEAT_MARKER, 0, 0, tick)
    }

    pub fn no_op(tick: Tick) -> Self {
        Self::raw(STATUS_NO_OP, 0, 0, tick)
    }

    /// The raw bytes this message would write to a hardware output port.
    /// Returns `None` for the internal sentinels, which are never emitted
    /// (spec §3 invariant).
    pub fn to_wire_bytes(&self) -> Option<Vec<u8>> {
        if self.is_no_op() || self.is_beat_marker() || self.is_meta() {
            return None;
        }
        if self.is_sysex() {
            let mut out = vec![self.status];
            if let Some(p) = &self.payload {
                out.extend_from_slice(p);
            }
            return Some(out);
        }
        if self.is_channel() {
            return Some(match self.status_nibble() {
                STATUS_PROGRAM_CHANGE | STATUS_CHANNEL_PRESSURE => {
                    vec![self.status, self.data1]
                }
                _ => vec![self.status, self.data1, self.data2],
            });
        }
        None
    }
}

impl fmt::Display for TimedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} status=0x{:02X} d1={} d2={}",
            self.tick, self.status, self.data1, self.data2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_predicates() {
        let m = TimedMessage::note_on(2, 60, 100, 10);
        assert!(m.is_channel());
        assert!(m.is_note_on());
        assert!(!m.is_note_off());
        assert_eq!(m.channel(), Some(2));
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        let m = TimedMessage::note_on(0, 60, 0, 0);
        assert!(m.is_note_on());
        assert!(m.is_note_off());
    }

    #[test]
    fn tempo_round_trips() {
        let m = TimedMessage::tempo(500_000, 0);
        assert!(m.is_tempo());
        assert_eq!(m.tempo_microseconds(), Some(500_000));
    }

    #[test]
    fn time_signature_round_trips() {
        let m = TimedMessage::time_signature(6, 3, 0); // 6/8
        assert_eq!(m.time_signature_fields(), Some((6, 8, 24)));
    }

    #[test]
    fn beat_marker_and_no_op_never_serialize() {
        assert_eq!(TimedMessage::beat_marker(0).to_wire_bytes(), None);
        assert_eq!(TimedMessage::no_op(0).to_wire_bytes(), None);
        assert!(!TimedMessage::beat_marker(0).is_channel());
        assert!(!TimedMessage::beat_marker(0).is_meta());
    }

    #[test]
    fn meta_never_serializes_to_wire() {
        assert_eq!(TimedMessage::tempo(500_000, 0).to_wire_bytes(), None);
    }

    #[test]
    fn program_change_is_two_bytes() {
        let m = TimedMessage::program_change(0, 25, 0);
        assert_eq!(m.to_wire_bytes(), Some(vec![0xC0, 25]));
    }

    #[test]
    fn note_on_is_three_bytes() {
        let m = TimedMessage::note_on(0, 60, 100, 0);
        assert_eq!(m.to_wire_bytes(), Some(vec![0x90, 60, 100]));
    }
}
