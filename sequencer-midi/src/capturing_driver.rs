//! In-memory [`OutputDriver`] double.
//!
//! Grounded on `src/utils.rs`'s `TestMidiSink`: a plain recording struct
//! that counts/stores what it was given instead of touching hardware, used
//! throughout the teacher's test suite in place of a real MIDI sink.

use crate::driver::{OutputDriver, PortDescriptor};
use crate::error::{MidiError, Result};

/// Records every message written to it instead of sending it anywhere.
/// Useful both for tests and for an embedder that wants to capture output
/// (e.g. to write it to a file) instead of opening real hardware.
#[derive(Default)]
pub struct CapturingOutputDriver {
    open_port: Option<usize>,
    pub sent: Vec<Vec<u8>>,
}

impl CapturingOutputDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_sent(&self) -> usize {
        self.sent.len()
    }
}

impl OutputDriver for CapturingOutputDriver {
    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor {
            index: 0,
            name: "capture".into(),
        }]
    }

    fn open(&mut self, index: usize) -> Result<()> {
        if self.open_port.is_some() {
            return Err(MidiError::PortAlreadyOpen);
        }
        if index != 0 {
            return Err(MidiError::InvalidPort(index));
        }
        self.open_port = Some(index);
        Ok(())
    }

    fn close(&mut self) {
        self.open_port = None;
    }

    fn is_open(&self) -> bool {
        self.open_port.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(MidiError::Send("no port open".into()));
        }
        self.sent.push(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sent_messages_only_while_open() {
        let mut d = CapturingOutputDriver::new();
        assert!(d.send(&[0x90, 60, 100]).is_err());
        d.open(0).unwrap();
        d.send(&[0x90, 60, 100]).unwrap();
        assert_eq!(d.messages_sent(), 1);
        d.close();
        assert!(!d.is_open());
    }

    #[test]
    fn open_twice_is_rejected() {
        let mut d = CapturingOutputDriver::new();
        d.open(0).unwrap();
        assert!(matches!(d.open(0), Err(MidiError::PortAlreadyOpen)));
    }
}
