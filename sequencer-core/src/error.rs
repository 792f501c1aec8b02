//! Error kinds for the core data model (spec §7).
//!
//! Driver- and engine-level failures (`InvalidPort`, `NoOutputPorts`,
//! `DriverBusy`) live in `sequencer-midi` and `sequencer-engine` instead,
//! since they depend on concepts (open ports, a running engine) this crate
//! doesn't have.

use thiserror::Error;

use crate::message::Tick;

/// Errors raised by [`crate::track::Track`] and [`crate::multitrack::MultiTrack`]
/// mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// An interval edit's range was nonsensical or fell outside the track.
    #[error("bad range [{start}, {end}): end must be >= start and <= track end time")]
    BadRange { start: Tick, end: Tick },

    /// An insert would violate the track's time-monotonicity or
    /// exactly-one-match invariant.
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// A track index was out of bounds for the owning `MultiTrack`.
    #[error("track index {0} is out of range")]
    InvalidTrack(usize),
}

pub type Result<T> = std::result::Result<T, SequencerError>;
