//! Timed messages, tracks, and the sequencer state machine.
//!
//! This crate has no threads and no I/O: it's the pure data model and
//! state-transition logic that `sequencer-engine` drives in real time and
//! `sequencer-midi` feeds to hardware. Everything here is unit-testable
//! without a clock or a MIDI port.

pub mod error;
pub mod iterator;
pub mod message;
pub mod multitrack;
pub mod note_matrix;
pub mod processor;
pub mod state;
pub mod track;

pub use error::{Result, SequencerError};
pub use iterator::MultiTrackIterator;
pub use message::{Tick, TimedMessage, TIME_INFINITE};
pub use multitrack::MultiTrack;
pub use note_matrix::NoteActivityMatrix;
pub use processor::{EventHook, TrackProcessor};
pub use state::{ChannelState, MetronomeMode, SequencerState};
pub use track::{InsertMode, Track, TrackStatus};
