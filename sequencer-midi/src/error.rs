//! Driver-level error kinds (spec §7). Kept separate from
//! `sequencer_core::SequencerError` since these depend on "a port is open",
//! a concept the core crate doesn't have.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("port index {0} is out of range")]
    InvalidPort(usize),

    #[error("no MIDI output ports are available")]
    NoOutputPorts,

    #[error("driver already has a port open")]
    PortAlreadyOpen,

    /// A send was retried for the driver's configured retry budget without
    /// succeeding (spec §7: this, specifically, is what `DriverBusy` means —
    /// not "a port is already open").
    #[error("driver busy: send retried without success for the configured retry budget")]
    DriverBusy,

    #[error("failed to send MIDI message: {0}")]
    Send(String),

    #[error("failed to open port: {0}")]
    Open(String),
}

pub type Result<T> = std::result::Result<T, MidiError>;
