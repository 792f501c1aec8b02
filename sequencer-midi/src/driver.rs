//! Hardware driver boundary (spec §6).
//!
//! Grounded on `examples/original_source/include/driver.h`'s abstract
//! `MIDIOutDriver`/`MIDIInDriver` (open/close/output-message/all-notes-off,
//! callback-based input), translated to Rust traits the way the teacher's
//! `groove-midi` crate wraps `midir`.

use crate::error::Result;

/// One hardware or virtual MIDI port, as reported by port enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDescriptor {
    pub index: usize,
    pub name: String,
}

/// A destination for outgoing MIDI bytes.
///
/// Implementations are not required to be `Send` across an arbitrary
/// thread boundary on their own; `sequencer-engine` holds the driver behind
/// its single reentrant mutex, so only one thread ever touches it at a
/// time, but the trait still requires `Send` because the engine's control
/// thread and timer thread are different OS threads taking turns with it.
pub trait OutputDriver: Send {
    /// Enumerates the currently available output ports. May change between
    /// calls if hardware is plugged or unplugged.
    fn ports(&self) -> Vec<PortDescriptor>;

    /// Opens the given port index. Fails with
    /// [`crate::error::MidiError::PortAlreadyOpen`] if a port is already
    /// open.
    fn open(&mut self, index: usize) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Writes one complete MIDI message's wire bytes.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// How long (in milliseconds) [`Self::send`] may keep retrying a failed
    /// write before giving up with
    /// [`crate::error::MidiError::DriverBusy`] (spec §7). Drivers with
    /// nothing to retry (e.g. an in-memory test double) can ignore this.
    fn set_retry_budget_ms(&mut self, _budget_ms: u64) {}
}

/// A source of incoming MIDI bytes, delivered via callback on a driver-owned
/// thread (mirrors the source's `MIDIInDriver` callback shape).
pub trait InputDriver: Send {
    fn ports(&self) -> Vec<PortDescriptor>;

    /// Opens `index` and begins delivering every received message's wire
    /// bytes to `callback`. The callback runs on a driver-internal thread;
    /// it must not block.
    fn open(&mut self, index: usize, callback: Box<dyn FnMut(&[u8]) + Send>) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}
