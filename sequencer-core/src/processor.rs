//! C6 — Per-Track Processor.
//!
//! Grounded on `examples/original_source/include/advancedsequencer.h`'s
//! `MIDISequencerTrackProcessor` (mute / solo / velocity scale /
//! rechannelize / transpose), translated from virtual-dispatch inheritance
//! to a concrete struct plus a `dyn` hook trait (spec §9 design note).

use crate::message::TimedMessage;

/// User-supplied hook run before any built-in processing. Returning `None`
/// drops the message entirely; this is how an embedder implements custom
/// filtering (e.g. a arpeggiator) without forking the processor chain.
pub trait EventHook: Send + Sync {
    fn process(&self, msg: &TimedMessage) -> Option<TimedMessage>;
}

/// Per-track signal chain applied to every channel message before it
/// reaches the output driver (spec §4.6). Order is fixed: hook, then mute,
/// then solo, then velocity scale, then rechannelize, then transpose.
/// Non-channel messages (meta, sysex) pass through the hook only; the rest
/// of the chain only makes sense for channel messages.
pub struct TrackProcessor {
    pub mute: bool,
    pub solo: bool,
    /// Multiplier applied to note-on velocity, clamped to `[1, 127]` after
    /// scaling (a scaled-to-zero velocity would silently turn a note-on
    /// into a note-off).
    pub velocity_scale: f32,
    /// When set, every channel message is rewritten to this channel.
    pub rechannelize: Option<u8>,
    /// Added to the key of note-on/note-off/poly-pressure messages,
    /// clamped to `[0, 127]`.
    pub transpose: i8,
    hook: Option<Box<dyn EventHook>>,
}

impl Default for TrackProcessor {
    fn default() -> Self {
        Self {
            mute: false,
            solo: false,
            velocity_scale: 1.0,
            rechannelize: None,
            transpose: 0,
            hook: None,
        }
    }
}

impl TrackProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hook(&mut self, hook: Box<dyn EventHook>) {
        self.hook = Some(hook);
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    /// Runs `msg` through the chain. `any_solo` is whether *any* track in
    /// the multi-track is currently soloed; when true, every track other
    /// than the soloed ones is silenced regardless of its own `mute` flag
    /// (spec §8 scenario S6: solo takes precedence over mute).
    pub fn process(&self, msg: &TimedMessage, any_solo: bool) -> Option<TimedMessage> {
        let msg = match &self.hook {
            Some(hook) => hook.process(msg)?,
            None => msg.clone(),
        };

        if !msg.is_channel() {
            return Some(msg);
        }

        let silenced = if any_solo { !self.solo } else { self.mute };
        if silenced {
            return None;
        }

        let mut msg = msg;
        if msg.is_note_on() && msg.data2() > 0 {
            let scaled = (msg.data2() as f32 * self.velocity_scale).round();
            let velocity = scaled.clamp(1.0, 127.0) as u8;
            msg = TimedMessage::note_on(
                msg.channel().unwrap_or(0),
                msg.data1(),
                velocity,
                msg.tick(),
            );
        }

        if let Some(channel) = self.rechannelize {
            msg = rechannelize(&msg, channel);
        }

        if self.transpose != 0 && (msg.is_note_on() || msg.is_note_off()) {
            let key = (msg.data1() as i16 + self.transpose as i16).clamp(0, 127) as u8;
            msg = if msg.is_note_off() {
                TimedMessage::note_off(msg.channel().unwrap_or(0), key, msg.tick())
            } else {
                TimedMessage::note_on(msg.channel().unwrap_or(0), key, msg.data2(), msg.tick())
            };
        }

        Some(msg)
    }
}

fn rechannelize(msg: &TimedMessage, channel: u8) -> TimedMessage {
    // Reconstruct through the public constructors so the synthetic status
    // byte stays valid for whichever message type this is.
    match msg.status() & 0xF0 {
        crate::message::STATUS_NOTE_ON => {
            TimedMessage::note_on(channel, msg.data1(), msg.data2(), msg.tick())
        }
        crate::message::STATUS_NOTE_OFF => TimedMessage::note_off(channel, msg.data1(), msg.tick()),
        crate::message::STATUS_CONTROL_CHANGE => {
            TimedMessage::control_change(channel, msg.data1(), msg.data2(), msg.tick())
        }
        crate::message::STATUS_PROGRAM_CHANGE => {
            TimedMessage::program_change(channel, msg.data1(), msg.tick())
        }
        crate::message::STATUS_PITCH_BEND => {
            let value = ((msg.data2() as i32) << 7 | msg.data1() as i32) - 8192;
            TimedMessage::pitch_bend(channel, value as i16, msg.tick())
        }
        _ => msg.clone(),
    }
}
