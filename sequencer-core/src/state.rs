//! C7 — Sequencer State.
//!
//! Grounded on `examples/original_source/src/sequencer.cpp`'s
//! `MIDISequencerState`/`MIDISequencerTrackState::Process` event-processing
//! rules: a running snapshot of "what hardware would currently look like"
//! that can be rebuilt by replaying a `MultiTrackIterator` from tick 0, used
//! both for normal dispatch bookkeeping and for seek reconstruction (spec
//! §4.3, §4.4).

use crate::message::{Tick, TimedMessage, CC_ALL_NOTES_OFF};
use crate::note_matrix::NoteActivityMatrix;

const NUM_CHANNELS: usize = 16;
const NUM_CONTROLLERS: usize = 128;

/// Which field of a time-signature event decides the metronome's beat
/// length (spec §4.7). `SequencerState` doesn't pick one for itself; an
/// embedder calls [`SequencerState::set_metronome_mode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MetronomeMode {
    /// `beat_length = clocks_per_metronome * clocks_per_beat / 24`, taken
    /// from the time-signature event's own clocks-per-metronome-click byte.
    FollowMidiMessage,
    /// `beat_length = clocks_per_beat * 4 / denominator`. The source's most
    /// common default, and this crate's default too.
    #[default]
    FollowDenominator,
    /// Follow-denominator, but tripled for compound time (`numerator % 3 ==
    /// 0 && numerator != 3`), so a beat in 6/8 is a dotted quarter rather
    /// than an eighth note.
    FollowTheoretic,
}

/// Per-MIDI-channel snapshot: current program, pitch bend, and controller
/// values. Controllers 123-127 are channel-mode messages, not "current
/// values" (SPEC_FULL supplement 1), so only indices `0..CC_ALL_NOTES_OFF`
/// are stored.
#[derive(Clone)]
pub struct ChannelState {
    controllers: [u8; NUM_CONTROLLERS],
    program: u8,
    bender: i16,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            controllers: [0; NUM_CONTROLLERS],
            program: 0,
            bender: 0,
        }
    }
}

impl ChannelState {
    pub fn controller(&self, number: u8) -> u8 {
        self.controllers[number as usize & 0x7F]
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn bender(&self) -> i16 {
        self.bender
    }
}

/// Running interpretation of a score's meta/channel content (spec §4.4).
pub struct SequencerState {
    clocks_per_beat: u32,
    tempo_microseconds: u32,
    tempo_scale: f64,
    time_signature: (u8, u8),
    clocks_per_metronome: u8,
    metronome_mode: MetronomeMode,
    key_signature: (i8, bool),
    channels: [ChannelState; NUM_CHANNELS],
    note_matrix: NoteActivityMatrix,
    track_names: Vec<Option<String>>,
    marker: Option<String>,

    current_tick: Tick,
    current_ms: f64,
    last_tempo_change_tick: Tick,
    last_tempo_change_ms: f64,

    beat: u32,
    measure: u32,
    last_beat_tick: Tick,
    next_beat_tick: Tick,
    /// Set by [`Self::process`] whenever a beat-marker changed `beat` or
    /// `measure`; consumed once by [`Self::take_beat_event`]. `process`
    /// can't notify directly — this crate has no notifier dependency — so
    /// the caller (the engine) polls this after every `process` call that
    /// might be a beat-marker.
    pending_beat_event: Option<(u32, u32)>,
}

impl SequencerState {
    pub fn new(clocks_per_beat: u32) -> Self {
        debug_assert!(clocks_per_beat > 0);
        Self {
            clocks_per_beat,
            tempo_microseconds: 500_000, // 120 BPM, same default as the source.
            tempo_scale: 1.0,
            time_signature: (4, 4),
            clocks_per_metronome: 24,
            metronome_mode: MetronomeMode::default(),
            key_signature: (0, false),
            channels: std::array::from_fn(|_| ChannelState::default()),
            note_matrix: NoteActivityMatrix::new(),
            track_names: Vec::new(),
            marker: None,
            current_tick: 0,
            current_ms: 0.0,
            last_tempo_change_tick: 0,
            last_tempo_change_ms: 0.0,
            beat: 0,
            measure: 0,
            last_beat_tick: 0,
            next_beat_tick: (clocks_per_beat * 4 / 4).max(1),
            pending_beat_event: None,
        }
    }

    pub fn set_clocks_per_beat(&mut self, clocks_per_beat: u32) {
        debug_assert!(clocks_per_beat > 0);
        self.clocks_per_beat = clocks_per_beat;
    }

    pub fn metronome_mode(&self) -> MetronomeMode {
        self.metronome_mode
    }

    pub fn set_metronome_mode(&mut self, mode: MetronomeMode) {
        let old_beat_length = self.beat_length();
        self.metronome_mode = mode;
        self.retime_beat_clock(old_beat_length);
    }

    /// Keeps the per-track name cache sized to the owning `MultiTrack`
    /// (spec §9 Open Question (b): this must never be left for the caller
    /// to maintain by hand).
    pub fn sync_track_count(&mut self, num_tracks: usize) {
        self.track_names.resize(num_tracks, None);
    }

    pub fn channel(&self, channel: u8) -> &ChannelState {
        &self.channels[channel as usize & 0x0F]
    }

    pub fn note_matrix(&self) -> &NoteActivityMatrix {
        &self.note_matrix
    }

    /// Clears sounding-note/sustain bookkeeping without touching tempo,
    /// time-signature, or per-channel program/controller state. Called
    /// after an all-notes-off broadcast so a later query doesn't report
    /// notes that hardware has already been told to silence.
    pub fn clear_note_matrix(&mut self) {
        self.note_matrix.clear();
    }

    pub fn track_name(&self, track: usize) -> Option<&str> {
        self.track_names.get(track).and_then(|n| n.as_deref())
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Tempo in quarter notes per minute, adjusted by [`Self::set_tempo_scale`].
    pub fn tempo_bpm(&self) -> f64 {
        60_000_000.0 / self.tempo_microseconds as f64 * self.tempo_scale
    }

    /// Tempo in quarter notes per minute as written in the score, ignoring
    /// any runtime scale factor (SPEC_FULL supplement 3).
    pub fn tempo_bpm_unscaled(&self) -> f64 {
        60_000_000.0 / self.tempo_microseconds as f64
    }

    pub fn tempo_scale(&self) -> f64 {
        self.tempo_scale
    }

    pub fn set_tempo_scale(&mut self, scale: f64) {
        self.tempo_scale = scale;
    }

    pub fn time_signature(&self) -> (u8, u8) {
        self.time_signature
    }

    pub fn key_signature(&self) -> (i8, bool) {
        self.key_signature
    }

    /// Ticks per beat under the configured metronome-beat policy (spec
    /// §4.7). Defaults to "follow-denominator" (an eighth note in 6/8),
    /// not always a quarter note.
    pub fn beat_length(&self) -> Tick {
        let (numerator, denominator) = self.time_signature;
        let follow_denominator =
            (self.clocks_per_beat as u64 * 4 / denominator.max(1) as u64).max(1);
        match self.metronome_mode {
            MetronomeMode::FollowMidiMessage => {
                (self.clocks_per_metronome as u64 * self.clocks_per_beat as u64 / 24).max(1) as Tick
            }
            MetronomeMode::FollowDenominator => follow_denominator as Tick,
            MetronomeMode::FollowTheoretic => {
                if numerator % 3 == 0 && numerator != 3 {
                    (follow_denominator * 3) as Tick
                } else {
                    follow_denominator as Tick
                }
            }
        }
    }

    /// Beats per measure under the current time signature and beat-length
    /// policy (spec §4.7: `clocks_per_beat * numerator * 4 / (denominator *
    /// beat_length)`); reduces to the numerator when following the
    /// denominator directly.
    pub fn number_of_beats(&self) -> u32 {
        let (numerator, denominator) = self.time_signature;
        let beat_length = self.beat_length().max(1) as u64;
        ((self.clocks_per_beat as u64 * numerator as u64 * 4) / (denominator.max(1) as u64 * beat_length))
            .max(1) as u32
    }

    pub fn measure_length(&self) -> Tick {
        self.beat_length().saturating_mul(self.number_of_beats() as Tick)
    }

    /// Milliseconds per tick at the current tempo, accounting for scale
    /// (the `midiToMs` building block spec §6 exposes).
    pub fn ms_per_tick(&self) -> f64 {
        let us_per_quarter = self.tempo_microseconds as f64 / self.tempo_scale;
        us_per_quarter / 1000.0 / self.clocks_per_beat as f64
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// `last_tempo_change_ms + (current_tick - last_tempo_change_tick) *
    /// ms_per_tick` (spec §3 invariant), recomputed whenever `current_tick`
    /// moves.
    pub fn current_ms(&self) -> f64 {
        self.current_ms
    }

    pub fn last_tempo_change_tick(&self) -> Tick {
        self.last_tempo_change_tick
    }

    pub fn last_tempo_change_ms(&self) -> f64 {
        self.last_tempo_change_ms
    }

    pub fn beat(&self) -> u32 {
        self.beat
    }

    pub fn measure(&self) -> u32 {
        self.measure
    }

    pub fn next_beat_tick(&self) -> Tick {
        self.next_beat_tick
    }

    /// Consumes the beat/measure change flagged by the most recent
    /// beat-marker `process` call, if any.
    pub fn take_beat_event(&mut self) -> Option<(u32, u32)> {
        self.pending_beat_event.take()
    }

    /// Pins `current_tick` (and recomputes `current_ms` from it) without
    /// processing a message — used after a seek's replay walk, which may
    /// stop short of `target` if no event lands exactly there (spec §4.6
    /// step 6: "update current_ms").
    pub fn force_tick_position(&mut self, tick: Tick) {
        self.current_tick = tick;
        self.recompute_current_ms();
    }

    /// Reconstructs beat/measure/next-beat-tick for an arbitrary tick,
    /// assuming the current time signature and beat-length policy held from
    /// tick 0 (the same simplifying assumption `seek_to_measure` makes).
    /// Real playback instead derives these incrementally from beat-marker
    /// events via [`Self::process`]; this is only for jumping into the
    /// middle of a score without replaying every beat.
    pub fn rebuild_beat_position(&mut self, tick: Tick) {
        let beat_length = self.beat_length().max(1);
        let number_of_beats = self.number_of_beats().max(1);
        let total_beats = tick / beat_length;
        self.beat = total_beats % number_of_beats;
        self.measure = total_beats / number_of_beats;
        self.last_beat_tick = total_beats * beat_length;
        self.next_beat_tick = self.last_beat_tick + beat_length;
    }

    fn recompute_current_ms(&mut self) {
        let delta_ticks = self.current_tick as i64 - self.last_tempo_change_tick as i64;
        self.current_ms = self.last_tempo_change_ms + delta_ticks as f64 * self.ms_per_tick();
    }

    fn retime_beat_clock(&mut self, old_beat_length: Tick) {
        let new_beat_length = self.beat_length();
        if new_beat_length != old_beat_length {
            let delta = new_beat_length as i64 - old_beat_length as i64;
            self.next_beat_tick = (self.next_beat_tick as i64 + delta).max(0) as Tick;
        }
    }

    /// Applies one dispatched message's effect to the running state.
    /// `track` identifies which track it came from, needed only for
    /// track-scoped meta (track name / instrument name / marker).
    pub fn process(&mut self, track: usize, msg: &TimedMessage) {
        if msg.is_no_op() {
            return;
        }

        // Rule 3: advance current-tick and recompute current-ms before
        // interpreting the message itself.
        if msg.tick() != self.current_tick {
            self.current_tick = msg.tick();
            self.recompute_current_ms();
        }

        if msg.is_beat_marker() {
            self.apply_beat_marker();
            return;
        }

        if msg.is_tempo() {
            if let Some(us) = msg.tempo_microseconds() {
                self.tempo_microseconds = us;
            }
            self.last_tempo_change_tick = self.current_tick;
            self.last_tempo_change_ms = self.current_ms;
            return;
        }
        if msg.is_time_signature() {
            let old_beat_length = self.beat_length();
            if let Some((num, den, clocks_per_metronome)) = msg.time_signature_fields() {
                self.time_signature = (num, den);
                self.clocks_per_metronome = clocks_per_metronome;
            }
            self.retime_beat_clock(old_beat_length);
            return;
        }
        if msg.is_key_signature() {
            if let Some(fields) = msg.key_signature_fields() {
                self.key_signature = fields;
            }
            return;
        }
        if msg.is_track_name() || msg.is_instrument_name() {
            if let Some(text) = msg.text() {
                if let Some(slot) = self.track_names.get_mut(track) {
                    *slot = Some(text.to_owned());
                }
            }
            return;
        }
        if msg.is_marker_text() {
            self.marker = msg.text().map(str::to_owned);
            return;
        }
        if msg.is_generic_text() {
            return;
        }

        self.note_matrix.process(msg);

        let Some(channel) = msg.channel() else {
            return;
        };
        let state = &mut self.channels[channel as usize];
        if msg.is_control_change() {
            let controller = msg.data1();
            // SPEC_FULL supplement 1: only 0..CC_ALL_NOTES_OFF is a "current
            // value"; 120-127 are channel-mode messages handled by the note
            // matrix above.
            if controller < CC_ALL_NOTES_OFF {
                state.controllers[controller as usize] = msg.data2();
            }
        } else if msg.is_program_change() {
            state.program = msg.data1();
        } else if msg.is_pitch_bend() {
            let raw = (msg.data2() as i32) << 7 | msg.data1() as i32;
            state.bender = (raw - 8192) as i16;
        }
    }

    /// Rule 4: a beat-marker increments beat/measure only if it hasn't
    /// already been counted (guards against the same tick being processed
    /// twice), then always advances the next-beat schedule.
    fn apply_beat_marker(&mut self) {
        let mut changed = false;
        if self.last_beat_tick != self.next_beat_tick {
            self.beat += 1;
            if self.beat >= self.number_of_beats() {
                self.beat = 0;
                self.measure += 1;
            }
            changed = true;
        }
        self.last_beat_tick = self.current_tick;
        self.next_beat_tick += self.beat_length();
        if changed {
            self.pending_beat_event = Some((self.beat, self.measure));
        }
    }

    /// All messages needed to silence every sounding note (spec §4.4 rule 4,
    /// used when stopping or seeking away from the current position).
    pub fn all_notes_off(&self, tick: Tick) -> Vec<TimedMessage> {
        self.note_matrix.all_notes_off(tick)
    }

    /// Resets to the power-on snapshot, keeping the configured resolution.
    pub fn reset(&mut self) {
        let cpb = self.clocks_per_beat;
        let num_tracks = self.track_names.len();
        let mode = self.metronome_mode;
        *self = Self::new(cpb);
        self.metronome_mode = mode;
        self.sync_track_count(num_tracks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tempo_is_120_bpm() {
        let s = SequencerState::new(480);
        assert!((s.tempo_bpm() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_message_updates_bpm() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::tempo(400_000, 0)); // 150 BPM
        assert!((s.tempo_bpm_unscaled() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_scale_affects_scaled_but_not_unscaled() {
        let mut s = SequencerState::new(480);
        s.set_tempo_scale(2.0);
        assert!((s.tempo_bpm() - 240.0).abs() < 1e-9);
        assert!((s.tempo_bpm_unscaled() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn beat_length_follows_denominator() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::time_signature(6, 3, 0)); // 6/8
        assert_eq!(s.beat_length(), 240);
        assert_eq!(s.measure_length(), 1440);
    }

    #[test]
    fn theoretic_mode_triples_compound_time_beat() {
        let mut s = SequencerState::new(480);
        s.set_metronome_mode(MetronomeMode::FollowTheoretic);
        s.process(0, &TimedMessage::time_signature(6, 3, 0)); // 6/8, compound
        assert_eq!(s.beat_length(), 720); // dotted quarter, not an eighth
        assert_eq!(s.number_of_beats(), 2);
    }

    #[test]
    fn follow_midi_message_mode_uses_clocks_per_metronome() {
        let mut s = SequencerState::new(480);
        s.set_metronome_mode(MetronomeMode::FollowMidiMessage);
        // clocks_per_metronome defaults to 24 in TimedMessage::time_signature.
        s.process(0, &TimedMessage::time_signature(4, 2, 0)); // 4/4
        assert_eq!(s.beat_length(), 480); // 24 * 480 / 24
    }

    #[test]
    fn control_change_below_bound_is_stored() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::control_change(0, 7, 100, 0));
        assert_eq!(s.channel(0).controller(7), 100);
    }

    #[test]
    fn control_change_above_bound_is_not_stored_as_value() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::control_change(0, CC_ALL_NOTES_OFF, 1, 0));
        // Never written: reading it back just returns the array's initial 0,
        // which also happens to be what was sent — so assert via note matrix
        // side effect instead, which is the bound's real behavior.
        assert!(!s.note_matrix().is_sounding(0, 60));
    }

    #[test]
    fn program_change_and_pitch_bend_tracked_per_channel() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::program_change(2, 40, 0));
        s.process(0, &TimedMessage::pitch_bend(2, -100, 0));
        assert_eq!(s.channel(2).program(), 40);
        assert_eq!(s.channel(2).bender(), -100);
    }

    #[test]
    fn track_name_is_scoped_to_its_track() {
        let mut s = SequencerState::new(480);
        s.sync_track_count(2);
        s.process(1, &TimedMessage::track_name("Bass", 0));
        assert_eq!(s.track_name(1), Some("Bass"));
        assert_eq!(s.track_name(0), None);
    }

    #[test]
    fn note_on_then_stop_reconstructs_all_notes_off() {
        let mut s = SequencerState::new(480);
        s.process(0, &TimedMessage::note_on(0, 60, 100, 0));
        let seq = s.all_notes_off(10);
        assert_eq!(seq.len(), 1);
        assert!(seq[0].is_note_off());
    }

    #[test]
    fn reset_clears_state_but_keeps_track_count() {
        let mut s = SequencerState::new(480);
        s.sync_track_count(3);
        s.process(0, &TimedMessage::tempo(400_000, 0));
        s.reset();
        assert!((s.tempo_bpm() - 120.0).abs() < 1e-9);
        assert_eq!(s.track_name(2), None);
    }

    #[test]
    fn beat_marker_advances_beat_and_wraps_measure() {
        let mut s = SequencerState::new(480);
        // 4/4 at 480 clocks/beat: beat_length = 480, four beats/measure.
        let beat_len = s.beat_length();
        for beat in 1..=4u32 {
            s.process(0, &TimedMessage::beat_marker(beat_len * beat));
            let (got_beat, got_measure) = s.take_beat_event().unwrap();
            if beat < 4 {
                assert_eq!((got_beat, got_measure), (beat, 0));
            } else {
                assert_eq!((got_beat, got_measure), (0, 1));
            }
        }
    }

    #[test]
    fn beat_marker_at_already_counted_tick_does_not_double_increment() {
        let mut s = SequencerState::new(480);
        let beat_len = s.beat_length();
        s.process(0, &TimedMessage::beat_marker(beat_len));
        assert!(s.take_beat_event().is_some());
        // Re-processing the same (now stale) next_beat_tick is a no-op.
        s.process(0, &TimedMessage::beat_marker(beat_len));
        assert!(s.take_beat_event().is_none());
    }

    #[test]
    fn current_ms_tracks_tick_advances_at_constant_tempo() {
        let mut s = SequencerState::new(480); // 120 BPM -> ms_per_tick ~1.0417
        s.process(0, &TimedMessage::note_on(0, 60, 100, 480));
        assert!((s.current_ms() - 500.0).abs() < 0.01);
    }

    #[test]
    fn rebuild_beat_position_matches_incremental_tracking() {
        let mut s = SequencerState::new(480);
        let beat_len = s.beat_length();
        for beat in 1..=5u32 {
            s.process(0, &TimedMessage::beat_marker(beat_len * beat));
            s.take_beat_event();
        }
        let mut rebuilt = SequencerState::new(480);
        rebuilt.rebuild_beat_position(beat_len * 5);
        assert_eq!(rebuilt.beat(), s.beat());
        assert_eq!(rebuilt.measure(), s.measure());
    }
}
