//! End-to-end scenarios spanning several `sequencer-core` modules at once:
//! a score built from `MultiTrack`/`Track`, walked with a
//! `MultiTrackIterator`, interpreted by a `SequencerState`, and filtered
//! through `TrackProcessor`s.

use sequencer_core::{InsertMode, MultiTrack, MultiTrackIterator, SequencerState, TimedMessage, TrackProcessor};

const CPB: u32 = 480;

/// S1 — a single note on a single track dispatches as note-on then note-off,
/// in order, and nothing is left sounding afterward.
#[test]
fn s1_single_note_round_trip() {
    let mut mt = MultiTrack::new(CPB);
    mt.append_track();
    mt.track_mut(0)
        .unwrap()
        .insert_note(TimedMessage::note_on(0, 60, 100, 0), CPB, InsertMode::Insert)
        .unwrap();

    let mut it = MultiTrackIterator::new(mt.num_tracks());
    let mut state = SequencerState::new(CPB);
    state.sync_track_count(mt.num_tracks());

    let mut dispatched = Vec::new();
    while let Some((track, msg)) = it.next(&mt) {
        state.process(track, &msg);
        dispatched.push(msg);
    }

    assert_eq!(dispatched.len(), 2);
    assert!(dispatched[0].is_note_on());
    assert!(dispatched[1].is_note_off());
    assert!(!state.note_matrix().any_sounding());
}

/// S2 — a tempo meta event changes the engine's ms-per-tick conversion
/// immediately, and the unscaled/scaled BPM queries stay consistent.
#[test]
fn s2_tempo_change_updates_ms_per_tick() {
    let mut state = SequencerState::new(CPB);
    let initial_ms_per_tick = state.ms_per_tick();

    state.process(0, &TimedMessage::tempo(250_000, 0)); // 240 BPM
    let faster_ms_per_tick = state.ms_per_tick();

    assert!(faster_ms_per_tick < initial_ms_per_tick);
    assert!((state.tempo_bpm_unscaled() - 240.0).abs() < 1e-9);

    state.set_tempo_scale(0.5);
    assert!((state.tempo_bpm() - 120.0).abs() < 1e-9);
}

/// S3 — seeking forward without playing every intervening tick still
/// reconstructs the correct channel state, by replaying everything up to
/// the target tick through `SequencerState::process` without dispatching
/// it to any output.
#[test]
fn s3_seek_reconstructs_state_without_dispatch() {
    let mut mt = MultiTrack::new(CPB);
    mt.append_track();
    let track = mt.track_mut(0).unwrap();
    track
        .insert_event(TimedMessage::program_change(0, 40, 0), InsertMode::Insert)
        .unwrap();
    track
        .insert_event(TimedMessage::control_change(0, 7, 90, 100), InsertMode::Insert)
        .unwrap();
    track
        .insert_note(TimedMessage::note_on(0, 60, 100, 200), 100, InsertMode::Insert)
        .unwrap();
    track.set_end_time(1000).unwrap();

    let target = 250;
    let mut it = MultiTrackIterator::new(mt.num_tracks());
    let mut state = SequencerState::new(CPB);
    state.sync_track_count(mt.num_tracks());

    while let Some(tick) = it.peek_tick(&mt) {
        if tick >= target {
            break;
        }
        let (track, msg) = it.next(&mt).unwrap();
        state.process(track, &msg);
    }

    assert_eq!(state.channel(0).program(), 40);
    assert_eq!(state.channel(0).controller(7), 90);
    assert!(state.note_matrix().is_sounding(0, 60));

    // A seek to anywhere inside the still-sounding note must be able to shut
    // it off cleanly before resuming playback from the new position.
    let silence = state.all_notes_off(target);
    assert_eq!(silence.len(), 1);
    assert!(silence[0].is_note_off());
}

/// S4 — looping a region replays it with the same merged order each time.
#[test]
fn s4_loop_replays_region_identically() {
    let mut mt = MultiTrack::new(CPB);
    mt.append_track();
    mt.track_mut(0)
        .unwrap()
        .insert_note(TimedMessage::note_on(0, 67, 90, 0), 100, InsertMode::Insert)
        .unwrap();

    let mut it = MultiTrackIterator::new(mt.num_tracks());
    let mut first_pass = Vec::new();
    while let Some((_, msg)) = it.next(&mt) {
        first_pass.push((msg.tick(), msg.status(), msg.data1()));
    }

    it.seek(&mt, 0);
    let mut second_pass = Vec::new();
    while let Some((_, msg)) = it.next(&mt) {
        second_pass.push((msg.tick(), msg.status(), msg.data1()));
    }

    assert_eq!(first_pass, second_pass);
}

/// S5 — a per-track time shift offsets only that track's channel/sysex
/// ticks, leaving meta messages (and every other track) untouched, without
/// mutating the underlying score.
#[test]
fn s5_time_shift_is_per_track_and_exempts_meta() {
    let mut mt = MultiTrack::new(CPB);
    mt.append_track(); // track 0: conductor, carries a marker
    mt.append_track(); // track 1: shifted performer track
    mt.track_mut(0)
        .unwrap()
        .insert_event(TimedMessage::marker_text("verse", 100), InsertMode::Insert)
        .unwrap();
    mt.track_mut(1)
        .unwrap()
        .insert_event(TimedMessage::note_on(1, 60, 100, 100), InsertMode::Insert)
        .unwrap();

    let mut it = MultiTrackIterator::new(mt.num_tracks());
    it.set_time_shift(1, -30);

    let first = it.next(&mt).unwrap();
    let second = it.next(&mt).unwrap();
    let (marker_track, marker, note_track, note) = if first.1.is_marker_text() {
        (first.0, first.1, second.0, second.1)
    } else {
        (second.0, second.1, first.0, first.1)
    };

    assert_eq!(marker_track, 0);
    assert_eq!(marker.tick(), 100); // meta is never shifted
    assert_eq!(note_track, 1);
    assert_eq!(note.tick(), 70); // 100 - 30

    assert_eq!(mt.track(1).unwrap().events()[0].tick(), 100); // underlying score untouched
}

/// S6 — when any track is soloed, an unsoloed track stays silent even if
/// its own mute flag is off, and a soloed track plays even if muted.
#[test]
fn s6_solo_takes_precedence_over_mute() {
    let quiet = TrackProcessor::new();
    let mut loud = TrackProcessor::new();
    loud.mute = true;
    loud.solo = true;

    let any_solo = true;
    assert!(quiet.process(&TimedMessage::note_on(0, 60, 100, 0), any_solo).is_none());
    assert!(loud.process(&TimedMessage::note_on(1, 60, 100, 0), any_solo).is_some());
}
