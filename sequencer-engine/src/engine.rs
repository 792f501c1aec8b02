//! C8 — Sequencer Engine.
//!
//! Grounded on `examples/original_source/src/sequencer.cpp`
//! (`MIDISequencer::MsgNext`/`RtSendMsg` dispatch loop) and
//! `examples/original_source/include/advancedsequencer.h`'s
//! `AdvancedSequencer` (seek/loop/count-in/per-track control public
//! surface).
//!
//! Two threads touch this: a timer thread calling [`SequencerEngine::tick`]
//! roughly once a millisecond, and a control thread calling the
//! play/stop/seek/mute methods. Both go through the same
//! `parking_lot::ReentrantMutex` (spec §5) — `std::sync::Mutex` isn't
//! reentrant, and the control thread's own calls can themselves land back
//! on the timer thread's lock (e.g. `stop()` called from inside a
//! `Notifier` callback that itself runs on the tick thread).

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use sequencer_core::{
    MultiTrack, MultiTrackIterator, SequencerError, SequencerState, Tick, TimedMessage,
    TrackProcessor,
};
use sequencer_midi::PortManager;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::notifier::{Notification, Notifier};
use crate::tick_framework::TickComponent;

/// Whether playback stops once the score runs out of events, or keeps the
/// transport running (e.g. so a live-fed track can still receive new
/// events, or so beat-markers keep firing for a metronome) (spec §4.8,
/// SPEC_FULL supplement on play mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Bounded,
    Unbounded,
}

struct EngineInner {
    multitrack: MultiTrack,
    iterator: MultiTrackIterator,
    state: SequencerState,
    processors: Vec<TrackProcessor>,
    out_ports: Vec<usize>,
    port_manager: PortManager,
    notifier: Box<dyn Notifier>,
    config: EngineConfig,

    playing: bool,
    play_mode: PlayMode,
    current_tick: Tick,

    /// Wall-ms value (as reported by the timer thread) that corresponds to
    /// `state.last_tempo_change_tick()`/`last_tempo_change_ms()`. Reset
    /// whenever those do: on play, seek, loop wraparound, count-in
    /// completion, and every dispatched tempo message. Between resets,
    /// `target_tick = last_tempo_change_tick + (sys_ms - sys_time_offset) /
    /// ms_per_tick` — recomputed fresh each `tick()` call rather than
    /// accumulated, so it can't drift.
    sys_time_offset: u64,
    /// True when the next `tick()` call should treat its `sys_ms` as the
    /// anchor instant, because we don't yet know "now" (e.g. right after
    /// `play()`, before the timer thread has called in).
    needs_anchor: bool,
    /// Last `sys_ms` seen by `tick()`, used as a "now" proxy by
    /// control-thread methods (seek, set_tempo_scale) that need to
    /// re-anchor outside of a tick call.
    last_seen_sys_ms: u64,

    loop_region: Option<(Tick, Tick)>,

    count_in_enabled: bool,
    count_in_measures: u32,
    count_in_pending: bool,
    count_in_elapsed: Tick,
}

impl EngineInner {
    fn track_count(&self) -> usize {
        self.multitrack.num_tracks()
    }

    fn out_port(&self, track: usize) -> usize {
        self.out_ports.get(track).copied().unwrap_or(0)
    }

    fn send_bytes(&mut self, port: usize, bytes: &[u8]) {
        if let Err(err) = self.port_manager.send(port, bytes) {
            log::warn!("driver send failed: {err}");
            self.notifier.notify(Notification::DriverError(err.to_string()));
        }
    }

    /// Silences every sounding note on every open port (spec §5: all-notes-off
    /// traverses every open port and every channel), and clears the
    /// internal note-activity bookkeeping to match.
    fn silence_everything(&mut self) {
        self.port_manager.all_notes_off();
        self.state.clear_note_matrix();
        self.notifier.notify(Notification::AllNotesOff);
    }

    /// Rebuilds `state` by replaying every event from tick 0 up to and
    /// including `target`, without dispatching anything to the driver
    /// (spec §4.3, §4.6 step 3, §8 scenario S3). Pins `current_tick` to
    /// exactly `target` afterward, even if no event landed there.
    fn rebuild_state_up_to(&mut self, target: Tick) {
        self.state.reset();
        self.state.sync_track_count(self.track_count());
        let mut scan = MultiTrackIterator::new(self.track_count());
        while let Some(tick) = scan.peek_tick(&self.multitrack) {
            if tick > target {
                break;
            }
            let (track, msg) = scan.next(&self.multitrack).expect("peeked Some");
            self.state.process(track, &msg);
        }
        self.state.force_tick_position(target);
        self.state.rebuild_beat_position(target);
    }

    /// Re-anchors the tick<->wall-clock mapping to "now" (spec §4.5 step 2,
    /// §4.6 step 6, §4.8 loop wraparound): subsequent `tick()` calls measure
    /// elapsed time from this instant against the state's current position.
    fn reanchor(&mut self, sys_ms: u64) {
        self.sys_time_offset = sys_ms;
        self.needs_anchor = false;
    }

    /// The full seek sequence (spec §4.6), usable from the public `seek()`
    /// entry point and from loop wraparound, which is itself "seek back to
    /// the loop start."
    fn seek_to(&mut self, target: Tick) {
        let was_enabled = self.notifier.get_enable();
        self.notifier.set_enable(false);

        self.silence_everything();
        self.rebuild_state_up_to(target);
        self.iterator.seek(&self.multitrack, target);
        self.current_tick = target;
        self.reanchor(self.last_seen_sys_ms);

        self.notifier.set_enable(was_enabled);
        if was_enabled {
            self.notifier.notify(Notification::Refresh);
        }
    }
}

/// The real-time driver: owns the score, the playback cursor, the output
/// driver(s), and the notification channel.
pub struct SequencerEngine {
    inner: ReentrantMutex<RefCell<EngineInner>>,
}

impl SequencerEngine {
    pub fn new(
        multitrack: MultiTrack,
        mut port_manager: PortManager,
        notifier: Box<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let num_tracks = multitrack.num_tracks();
        let clocks_per_beat = multitrack.clocks_per_beat();
        let mut state = SequencerState::new(clocks_per_beat);
        state.sync_track_count(num_tracks);
        port_manager.set_retry_budget_ms(config.driver_retry_budget_ms);
        let inner = EngineInner {
            iterator: MultiTrackIterator::new(num_tracks),
            multitrack,
            state,
            processors: (0..num_tracks).map(|_| TrackProcessor::new()).collect(),
            out_ports: vec![0; num_tracks],
            port_manager,
            notifier,
            config,
            playing: false,
            play_mode: PlayMode::default(),
            current_tick: 0,
            sys_time_offset: 0,
            needs_anchor: true,
            last_seen_sys_ms: 0,
            loop_region: None,
            count_in_enabled: false,
            count_in_measures: 1,
            count_in_pending: false,
            count_in_elapsed: 0,
        };
        Self {
            inner: ReentrantMutex::new(RefCell::new(inner)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().borrow().playing
    }

    pub fn current_tick(&self) -> Tick {
        self.inner.lock().borrow().current_tick
    }

    pub fn current_ms(&self) -> f64 {
        self.inner.lock().borrow().state.current_ms()
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.inner.lock().borrow().state.tempo_bpm()
    }

    pub fn tempo_bpm_unscaled(&self) -> f64 {
        self.inner.lock().borrow().state.tempo_bpm_unscaled()
    }

    pub fn set_tempo_scale(&self, scale: f64) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.state.set_tempo_scale(scale);
        let now = inner.last_seen_sys_ms;
        inner.reanchor(now);
    }

    pub fn time_signature(&self) -> (u8, u8) {
        self.inner.lock().borrow().state.time_signature()
    }

    pub fn key_signature(&self) -> (i8, bool) {
        self.inner.lock().borrow().state.key_signature()
    }

    pub fn marker(&self) -> Option<String> {
        self.inner.lock().borrow().state.marker().map(str::to_owned)
    }

    pub fn current_beat(&self) -> u32 {
        self.inner.lock().borrow().state.beat()
    }

    pub fn current_measure(&self) -> u32 {
        self.inner.lock().borrow().state.measure()
    }

    pub fn track_name(&self, track: usize) -> Option<String> {
        self.inner.lock().borrow().state.track_name(track).map(str::to_owned)
    }

    pub fn track_count(&self) -> usize {
        self.inner.lock().borrow().track_count()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.inner.lock().borrow().play_mode
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        self.inner.lock().borrow_mut().play_mode = mode;
    }

    /// Enables or disables count-in, and sets how many full measures of
    /// beat-marker-only pre-roll it runs (spec §4.8). `measures` is only
    /// validated when `enabled` is true; disabling ignores it.
    pub fn set_count_in(&self, enabled: bool, measures: u32) -> Result<()> {
        if enabled && measures < 1 {
            return Err(EngineError::InvalidCountIn);
        }
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.count_in_enabled = enabled;
        if enabled {
            inner.count_in_measures = measures;
        }
        Ok(())
    }

    pub fn count_in_enabled(&self) -> bool {
        self.inner.lock().borrow().count_in_enabled
    }

    pub fn count_in_measures(&self) -> u32 {
        self.inner.lock().borrow().count_in_measures
    }

    /// Arms count-in (if enabled) and starts the timer-driven dispatch
    /// loop. `Notification::Started` fires once real playback begins —
    /// immediately if count-in is off, or after `count_in_measures` of
    /// beat-marker-only pre-roll if it's on (spec §4.8).
    pub fn play(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.playing {
            return;
        }
        inner.playing = true;
        inner.needs_anchor = true;
        if inner.count_in_enabled {
            inner.count_in_pending = true;
            inner.count_in_elapsed = 0;
            log::debug!("sequencer counting in before tick {}", inner.current_tick);
        } else {
            inner.notifier.notify(Notification::Started);
            log::debug!("sequencer playing from tick {}", inner.current_tick);
        }
    }

    pub fn stop(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.playing {
            return;
        }
        inner.playing = false;
        inner.count_in_pending = false;
        let tick = inner.current_tick;
        inner.silence_everything();
        inner.notifier.notify(Notification::Stopped { tick });
        log::debug!("sequencer stopped at tick {tick}");
    }

    /// Moves the playback cursor to `target`, silencing anything currently
    /// sounding and rebuilding channel/tempo/beat state as if playback had
    /// reached `target` normally (spec §4.6).
    pub fn seek(&self, target: Tick) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.seek_to(target);
        inner.notifier.set_enable(true);
        inner.notifier.notify(Notification::Seeked { tick: target });
        log::debug!("sequencer seeked to tick {target}");
        Ok(())
    }

    /// Seeks to the tick nearest `target_ms` of virtual playback time at
    /// the current tempo (spec §4.6 entry point 2). An approximation when
    /// tempo changes lie between tick 0 and the target: it assumes the
    /// *current* tempo held for the whole distance, which is exact only if
    /// no tempo change separates `current_ms()` and `target_ms`.
    pub fn seek_to_ms(&self, target_ms: f64) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let ms_per_tick = inner.state.ms_per_tick().max(f64::MIN_POSITIVE);
        let current_ms = inner.state.current_ms();
        let current_tick = inner.current_tick as f64;
        let delta_ticks = (target_ms - current_ms) / ms_per_tick;
        let target = (current_tick + delta_ticks).max(0.0) as Tick;
        drop(inner);
        self.seek(target)
    }

    /// Seeks to the first tick of `measure` (0-based), beat `beat` within
    /// it (spec §4.6 entry point 3). Assumes the time signature in effect
    /// at tick 0 holds all the way to the target, like
    /// [`sequencer_core::SequencerState::rebuild_beat_position`] does.
    pub fn seek_to_measure(&self, measure: u32, beat: u32) -> Result<()> {
        let guard = self.inner.lock();
        let inner = guard.borrow_mut();
        let beat_length = inner.state.beat_length().max(1);
        let number_of_beats = inner.state.number_of_beats().max(1);
        let total_beats = measure as u64 * number_of_beats as u64 + beat.min(number_of_beats - 1) as u64;
        let target = (total_beats * beat_length as u64) as Tick;
        drop(inner);
        self.seek(target)
    }

    /// Sets (or clears) the loop region `[start, end)`. `end` must be
    /// greater than `start`.
    pub fn set_loop(&self, region: Option<(Tick, Tick)>) -> Result<()> {
        if let Some((start, end)) = region {
            if end <= start {
                return Err(EngineError::InvalidLoopRegion { start, end });
            }
        }
        self.inner.lock().borrow_mut().loop_region = region;
        Ok(())
    }

    fn with_processor<T>(&self, track: usize, f: impl FnOnce(&mut TrackProcessor) -> T) -> Result<T> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let processor = inner
            .processors
            .get_mut(track)
            .ok_or(SequencerError::InvalidTrack(track))?;
        Ok(f(processor))
    }

    pub fn set_mute(&self, track: usize, muted: bool) -> Result<()> {
        self.with_processor(track, |p| p.mute = muted)?;
        self.inner
            .lock()
            .borrow()
            .notifier
            .notify(Notification::TrackMuteChanged { track, muted });
        Ok(())
    }

    pub fn set_solo(&self, track: usize, solo: bool) -> Result<()> {
        self.with_processor(track, |p| p.solo = solo)?;
        self.inner
            .lock()
            .borrow()
            .notifier
            .notify(Notification::TrackSoloChanged { track, solo });
        Ok(())
    }

    /// Clears every track's mute flag in one call (§6 control surface).
    pub fn unmute_all(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        for (track, p) in inner.processors.iter_mut().enumerate() {
            if p.mute {
                p.mute = false;
                inner.notifier.notify(Notification::TrackMuteChanged { track, muted: false });
            }
        }
    }

    /// Clears every track's solo flag in one call (§6 control surface).
    pub fn unsolo_all(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        for (track, p) in inner.processors.iter_mut().enumerate() {
            if p.solo {
                p.solo = false;
                inner.notifier.notify(Notification::TrackSoloChanged { track, solo: false });
            }
        }
    }

    pub fn set_velocity_scale(&self, track: usize, scale: f32) -> Result<()> {
        self.with_processor(track, |p| p.velocity_scale = scale)
    }

    pub fn set_transpose(&self, track: usize, semitones: i8) -> Result<()> {
        self.with_processor(track, |p| p.transpose = semitones)
    }

    pub fn set_rechannelize(&self, track: usize, channel: Option<u8>) -> Result<()> {
        self.with_processor(track, |p| p.rechannelize = channel)
    }

    pub fn set_processor_hook(&self, track: usize, hook: Box<dyn sequencer_core::EventHook>) -> Result<()> {
        self.with_processor(track, move |p| p.set_hook(hook))
    }

    pub fn clear_processor_hook(&self, track: usize) -> Result<()> {
        self.with_processor(track, |p| p.clear_hook())
    }

    /// Sets `track`'s per-track tick offset (time-shift mode, spec §3/§4.2).
    pub fn set_time_shift(&self, track: usize, offset_ticks: i64) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if track >= inner.track_count() {
            return Err(SequencerError::InvalidTrack(track).into());
        }
        inner.iterator.set_time_shift(track, offset_ticks);
        Ok(())
    }

    pub fn set_time_shift_enabled(&self, enabled: bool) {
        self.inner.lock().borrow_mut().iterator.set_shift_enabled(enabled);
    }

    /// Assigns `track`'s output to `port` (an index into the engine's
    /// [`sequencer_midi::PortManager`]) (spec §6/§11 multi-port routing).
    pub fn set_out_port(&self, track: usize, port: usize) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if track >= inner.track_count() {
            return Err(SequencerError::InvalidTrack(track).into());
        }
        if !inner.port_manager.is_valid_driver(port) {
            return Err(sequencer_midi::MidiError::InvalidPort(port).into());
        }
        inner.out_ports[track] = port;
        Ok(())
    }

    /// Called by the timer thread with the current system time in
    /// milliseconds. Advances playback by however many ticks have elapsed
    /// since the last anchor point and dispatches every real event and
    /// synthetic beat-marker up to the new position, capped at
    /// `config.max_events_per_tick` per call so a long scheduling gap can't
    /// make one call dispatch unboundedly (spec §5).
    pub fn tick(&self, sys_ms: u64) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.last_seen_sys_ms = sys_ms;
        if !inner.playing {
            inner.needs_anchor = true;
            return;
        }

        if inner.count_in_pending {
            Self::advance_count_in(&mut inner, sys_ms);
            return;
        }

        if inner.needs_anchor {
            inner.reanchor(sys_ms);
            return;
        }

        let ms_per_tick = inner.state.ms_per_tick().max(f64::MIN_POSITIVE);
        let elapsed_ms = sys_ms.saturating_sub(inner.sys_time_offset) as f64;
        let ticks_since_anchor = (elapsed_ms / ms_per_tick).floor().max(0.0) as u32;
        let target_tick = inner
            .state
            .last_tempo_change_tick()
            .saturating_add(ticks_since_anchor);

        let cap = inner.config.max_events_per_tick;
        let mut dispatched = 0usize;
        'dispatch: while dispatched < cap {
            let real_peek = inner.iterator.peek_tick(&inner.multitrack);
            let beat_peek = inner.state.next_beat_tick();
            let beat_due = beat_peek <= target_tick
                && real_peek.map(|rt| beat_peek <= rt).unwrap_or(true);

            if beat_due {
                let marker = TimedMessage::beat_marker(beat_peek);
                inner.state.process(0, &marker);
                inner.current_tick = beat_peek;
                if let Some((beat, measure)) = inner.state.take_beat_event() {
                    inner.notifier.notify(Notification::BeatChanged { beat, measure });
                }
                dispatched += 1;

                if let Some((start, end)) = inner.loop_region {
                    if beat_peek >= end {
                        inner.seek_to(start);
                        inner.notifier.notify(Notification::Looped { back_to: start });
                        break 'dispatch;
                    }
                }
                continue;
            }

            let Some(peek) = real_peek else {
                inner.current_tick = target_tick;
                match inner.play_mode {
                    PlayMode::Bounded => {
                        inner.playing = false;
                        let tick = inner.current_tick;
                        inner.notifier.notify(Notification::Stopped { tick });
                    }
                    PlayMode::Unbounded => {}
                }
                break;
            };

            if peek > target_tick {
                inner.current_tick = target_tick;
                break;
            }

            let Some((track, msg)) = inner.iterator.next(&inner.multitrack) else {
                break;
            };
            inner.state.process(track, &msg);
            if msg.is_tempo() {
                inner.reanchor(sys_ms);
            }
            let any_solo = inner.processors.iter().any(|p| p.solo);
            let out = inner.processors.get(track).and_then(|p| p.process(&msg, any_solo));
            if let Some(out) = out {
                log::trace!("dispatch {out}");
                if let Some(bytes) = out.to_wire_bytes() {
                    let port = inner.out_port(track);
                    inner.send_bytes(port, &bytes);
                }
            }
            inner.current_tick = msg.tick();
            dispatched += 1;
        }
    }

    /// One measure of beat-marker-only pre-roll (spec §4.8): no real events
    /// dispatch, `state`'s beat/measure counters still advance and notify,
    /// and `current_tick` doesn't move. Completing it resets beat/measure
    /// to zero and re-anchors before real playback's first tick.
    fn advance_count_in(inner: &mut EngineInner, sys_ms: u64) {
        if inner.needs_anchor {
            inner.reanchor(sys_ms);
        }
        let ms_per_tick = inner.state.ms_per_tick().max(f64::MIN_POSITIVE);
        let elapsed_ms = sys_ms.saturating_sub(inner.sys_time_offset) as f64;
        let elapsed_ticks = (elapsed_ms / ms_per_tick).floor().max(0.0) as Tick;
        let beat_length = inner.state.beat_length().max(1);
        let measure_length = inner.state.measure_length().max(1);
        let count_in_length = measure_length.saturating_mul(inner.count_in_measures.max(1));
        let target = elapsed_ticks.min(count_in_length);

        while inner.count_in_elapsed + beat_length <= target {
            inner.count_in_elapsed += beat_length;
            let marker = TimedMessage::beat_marker(inner.count_in_elapsed);
            inner.state.process(0, &marker);
            if let Some((beat, measure)) = inner.state.take_beat_event() {
                inner.notifier.notify(Notification::BeatChanged { beat, measure });
            }
        }

        if target >= count_in_length {
            inner.count_in_pending = false;
            inner.count_in_elapsed = 0;
            inner.state.rebuild_beat_position(0);
            inner.reanchor(sys_ms);
            inner.notifier.notify(Notification::Started);
            log::debug!("sequencer playing from tick {} after count-in", inner.current_tick);
        }
    }
}

/// Adapts a shared [`SequencerEngine`] to the tick framework's
/// `TickComponent` trait, since the engine's own `tick` takes `&self` (the
/// reentrant mutex provides the interior mutability) rather than `&mut
/// self`.
pub struct EngineTickAdapter(Arc<SequencerEngine>);

impl EngineTickAdapter {
    pub fn new(engine: Arc<SequencerEngine>) -> Self {
        Self(engine)
    }
}

impl TickComponent for EngineTickAdapter {
    fn tick(&mut self, dev_ms: u64) {
        self.0.tick(dev_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::InsertMode;
    use sequencer_midi::CapturingOutputDriver;

    fn engine_with_one_note() -> (Arc<SequencerEngine>, crossbeam_channel::Receiver<Notification>) {
        let mut mt = MultiTrack::new(480);
        mt.append_track();
        mt.track_mut(0)
            .unwrap()
            .insert_note(TimedMessage::note_on(0, 60, 100, 0), 10, InsertMode::Insert)
            .unwrap();
        let pm = PortManager::new(vec![Box::new(CapturingOutputDriver::new())]).unwrap();
        let (notifier, receiver) = crate::notifier::ChannelNotifier::new();
        let engine = SequencerEngine::new(mt, pm, Box::new(notifier), EngineConfig::default());
        (Arc::new(engine), receiver)
    }

    #[test]
    fn play_then_tick_dispatches_events() {
        let (engine, receiver) = engine_with_one_note();
        engine.play();
        assert!(matches!(receiver.try_recv().unwrap(), Notification::Started));
        // First tick anchors; subsequent large jumps guarantee both events
        // have elapsed.
        engine.tick(1_000);
        engine.tick(2_000);
        engine.tick(3_000);
        assert!(engine.current_tick() >= 10);
    }

    #[test]
    fn stop_silences_and_notifies() {
        let (engine, receiver) = engine_with_one_note();
        engine.play();
        let _ = receiver.try_recv();
        engine.stop();
        let mut saw_all_notes_off = false;
        while let Ok(n) = receiver.try_recv() {
            if matches!(n, Notification::AllNotesOff) {
                saw_all_notes_off = true;
            }
        }
        assert!(saw_all_notes_off);
        assert!(!engine.is_playing());
    }

    #[test]
    fn invalid_loop_region_is_rejected() {
        let (engine, _receiver) = engine_with_one_note();
        assert!(engine.set_loop(Some((10, 5))).is_err());
    }

    #[test]
    fn mute_out_of_range_track_is_rejected() {
        let (engine, _receiver) = engine_with_one_note();
        assert!(engine.set_mute(5, true).is_err());
    }

    #[test]
    fn seek_notifies_and_updates_tick() {
        let (engine, receiver) = engine_with_one_note();
        let _ = engine.seek(5);
        assert_eq!(engine.current_tick(), 5);
        let mut saw_seeked = false;
        while let Ok(n) = receiver.try_recv() {
            if matches!(n, Notification::Seeked { tick: 5 }) {
                saw_seeked = true;
            }
        }
        assert!(saw_seeked);
    }

    #[test]
    fn seek_is_quiet_until_the_final_notification() {
        let (engine, receiver) = engine_with_one_note();
        let _ = engine.seek(5);
        let mut saw_refresh = false;
        let mut saw_seeked = false;
        while let Ok(n) = receiver.try_recv() {
            match n {
                Notification::Refresh => saw_refresh = true,
                Notification::Seeked { .. } => saw_seeked = true,
                other => panic!("unexpected notification during quiet seek: {other:?}"),
            }
        }
        assert!(saw_refresh);
        assert!(saw_seeked);
    }

    #[test]
    fn seek_target_tick_event_is_visible_immediately() {
        let (engine, _receiver) = engine_with_one_note();
        // The note-on lands exactly at tick 10; seeking to 10 must already
        // reflect it (the off-by-one this guards against stopped one tick
        // short).
        let _ = engine.seek(10);
        assert!(engine.inner.lock().borrow().state.note_matrix().is_sounding(0, 60));
    }

    #[test]
    fn out_of_range_out_port_is_rejected() {
        let (engine, _receiver) = engine_with_one_note();
        assert!(engine.set_out_port(0, 5).is_err());
        assert!(engine.set_out_port(0, 0).is_ok());
    }

    #[test]
    fn per_track_time_shift_is_rejected_for_invalid_track() {
        let (engine, _receiver) = engine_with_one_note();
        assert!(engine.set_time_shift(5, -10).is_err());
        assert!(engine.set_time_shift(0, -10).is_ok());
    }

    #[test]
    fn zero_measure_count_in_is_rejected() {
        let (engine, _receiver) = engine_with_one_note();
        assert!(matches!(
            engine.set_count_in(true, 0),
            Err(EngineError::InvalidCountIn)
        ));
        assert!(!engine.count_in_enabled());
    }

    #[test]
    fn unbounded_play_mode_does_not_auto_stop() {
        let (engine, receiver) = engine_with_one_note();
        engine.set_play_mode(PlayMode::Unbounded);
        engine.play();
        let _ = receiver.try_recv();
        engine.tick(1_000);
        engine.tick(5_000);
        engine.tick(9_000);
        assert!(engine.is_playing());
    }

    #[test]
    fn count_in_defers_started_and_emits_beats_first() {
        let (engine, receiver) = engine_with_one_note();
        engine.set_count_in(true, 1).unwrap();
        engine.play();
        // Started must not fire yet; count-in should emit beat markers.
        assert!(receiver.try_recv().is_err());
        engine.tick(1_000);
        engine.tick(2_000);
        engine.tick(3_000);
        engine.tick(4_000);
        engine.tick(5_000);
        let mut saw_started = false;
        let mut beat_events = 0;
        while let Ok(n) = receiver.try_recv() {
            match n {
                Notification::Started => saw_started = true,
                Notification::BeatChanged { .. } => beat_events += 1,
                _ => {}
            }
        }
        assert!(saw_started);
        assert!(beat_events > 0);
    }
}
