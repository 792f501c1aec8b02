//! Engine-level error kinds (spec §7), composing the lower crates' errors
//! rather than re-declaring their variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Sequencer(#[from] sequencer_core::SequencerError),

    #[error(transparent)]
    Midi(#[from] sequencer_midi::MidiError),

    #[error("loop region [{start}, {end}) is invalid")]
    InvalidLoopRegion { start: u32, end: u32 },

    #[error("count-in must be at least 1 beat")]
    InvalidCountIn,
}

pub type Result<T> = std::result::Result<T, EngineError>;
