//! C10 — Notifier.
//!
//! Grounded on `midi/src/lib.rs`'s `MidiInterfaceService`: a
//! `crossbeam_channel` sender/receiver pair, so the control thread (or a
//! GUI driving it) can poll or block for engine events without the engine
//! itself knowing anything about its consumer.

use sequencer_core::Tick;
use std::sync::atomic::{AtomicBool, Ordering};

/// Coarse category a [`Notification`] belongs to, so a consumer can
/// subscribe to just transport events, just errors, and so on, without
/// pattern-matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyGroup {
    Transport,
    Beat,
    Track,
    Error,
    /// Matches every notification, including [`Notification::Refresh`].
    /// Used by a seek's post-rebuild broadcast, which has no single natural
    /// group — a consumer should treat it as "re-read everything."
    All,
}

/// An event the engine reports after the fact; never blocks the dispatch
/// loop on delivery (spec §5: no logging or blocking I/O on the hot path).
#[derive(Clone, Debug)]
pub enum Notification {
    Started,
    Stopped { tick: Tick },
    Seeked { tick: Tick },
    Looped { back_to: Tick },
    BeatChanged { beat: u32, measure: u32 },
    TrackMuteChanged { track: usize, muted: bool },
    TrackSoloChanged { track: usize, solo: bool },
    AllNotesOff,
    DriverError(String),
    /// Broadcast once a seek's quiet rebuild walk finishes re-enabling
    /// notifications (spec §4.6 step 7): tells a consumer that muted during
    /// the walk "anything you cached may now be stale, re-read state."
    Refresh,
}

impl Notification {
    pub fn group(&self) -> NotifyGroup {
        match self {
            Notification::Started | Notification::Stopped { .. } | Notification::Seeked { .. } | Notification::Looped { .. } => {
                NotifyGroup::Transport
            }
            Notification::BeatChanged { .. } => NotifyGroup::Beat,
            Notification::TrackMuteChanged { .. } | Notification::TrackSoloChanged { .. } => {
                NotifyGroup::Track
            }
            Notification::AllNotesOff => NotifyGroup::Transport,
            Notification::DriverError(_) => NotifyGroup::Error,
            Notification::Refresh => NotifyGroup::All,
        }
    }
}

/// Receives engine events. Implementations must not block; the engine
/// calls this from inside its tick loop.
///
/// [`Self::set_enable`] backs the "quiet seek" pattern (spec §4.6 steps 2
/// and 7): the engine disables the notifier before its rebuild-state walk
/// and re-enables it afterward, so an embedder never sees a flood of
/// transport events for ticks it's about to jump past.
pub trait Notifier: Send {
    fn notify(&self, notification: Notification);
    fn set_enable(&self, enabled: bool);
    fn get_enable(&self) -> bool;
}

/// Delivers every notification over an unbounded `crossbeam_channel`,
/// dropping it (and logging at `warn`) only if the channel is
/// disconnected — an engine running headless shouldn't panic just because
/// nobody is listening anymore.
pub struct ChannelNotifier {
    sender: crossbeam_channel::Sender<Notification>,
    enabled: AtomicBool,
}

impl ChannelNotifier {
    /// Returns the notifier and the receiving end of its channel.
    pub fn new() -> (Self, crossbeam_channel::Receiver<Notification>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            Self {
                sender,
                enabled: AtomicBool::new(true),
            },
            receiver,
        )
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        if self.sender.send(notification).is_err() {
            log::warn!("notifier channel has no receiver; dropping notification");
        }
    }

    fn set_enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn get_enable(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Discards everything. Used when an embedder has no interest in events.
pub struct NullNotifier {
    enabled: AtomicBool,
}

impl Default for NullNotifier {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}

    fn set_enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn get_enable(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_delivers_in_order() {
        let (notifier, receiver) = ChannelNotifier::new();
        notifier.notify(Notification::Started);
        notifier.notify(Notification::Stopped { tick: 10 });
        assert!(matches!(receiver.recv().unwrap(), Notification::Started));
        assert!(matches!(receiver.recv().unwrap(), Notification::Stopped { tick: 10 }));
    }

    #[test]
    fn groups_classify_variants() {
        assert_eq!(Notification::Started.group(), NotifyGroup::Transport);
        assert_eq!(
            Notification::TrackMuteChanged { track: 0, muted: true }.group(),
            NotifyGroup::Track
        );
        assert_eq!(Notification::DriverError("x".into()).group(), NotifyGroup::Error);
        assert_eq!(Notification::Refresh.group(), NotifyGroup::All);
    }

    #[test]
    fn disabling_suppresses_delivery_until_reenabled() {
        let (notifier, receiver) = ChannelNotifier::new();
        assert!(notifier.get_enable());
        notifier.set_enable(false);
        notifier.notify(Notification::Seeked { tick: 5 });
        notifier.set_enable(true);
        notifier.notify(Notification::Refresh);
        assert!(matches!(receiver.recv().unwrap(), Notification::Refresh));
        assert!(receiver.try_recv().is_err());
    }
}
