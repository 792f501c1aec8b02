//! C11 — Port Manager.
//!
//! The source doesn't centralize this in one file; it's assembled from
//! `AdvancedSequencer`'s constructor, which takes a driver count and
//! requires at least one (`examples/original_source/include/driver.h`).
//! This manages however many [`OutputDriver`]s an embedder registers (one
//! per hardware interface) and can broadcast all-notes-off across all of
//! them at once, which the engine needs on stop/seek.

use crate::driver::{OutputDriver, PortDescriptor};
use crate::error::{MidiError, Result};

const CC_ALL_SOUND_OFF: u8 = 120;
const CC_ALL_NOTES_OFF: u8 = 123;

/// Owns a fixed set of output drivers and tracks which port is open on
/// each. Index 0 is conventionally the "default" output.
pub struct PortManager {
    drivers: Vec<Box<dyn OutputDriver>>,
}

impl PortManager {
    /// Requires at least one driver (spec §7's `NoOutputPorts`).
    pub fn new(drivers: Vec<Box<dyn OutputDriver>>) -> Result<Self> {
        if drivers.is_empty() {
            return Err(MidiError::NoOutputPorts);
        }
        Ok(Self { drivers })
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_valid_driver(&self, driver_index: usize) -> bool {
        driver_index < self.drivers.len()
    }

    pub fn ports(&self, driver_index: usize) -> Result<Vec<PortDescriptor>> {
        self.drivers
            .get(driver_index)
            .map(|d| d.ports())
            .ok_or(MidiError::InvalidPort(driver_index))
    }

    pub fn is_valid_port(&self, driver_index: usize, port_index: usize) -> bool {
        self.drivers
            .get(driver_index)
            .map(|d| d.ports().iter().any(|p| p.index == port_index))
            .unwrap_or(false)
    }

    pub fn open(&mut self, driver_index: usize, port_index: usize) -> Result<()> {
        let driver = self
            .drivers
            .get_mut(driver_index)
            .ok_or(MidiError::InvalidPort(driver_index))?;
        driver.open(port_index)
    }

    pub fn close(&mut self, driver_index: usize) -> Result<()> {
        let driver = self
            .drivers
            .get_mut(driver_index)
            .ok_or(MidiError::InvalidPort(driver_index))?;
        driver.close();
        Ok(())
    }

    pub fn send(&mut self, driver_index: usize, bytes: &[u8]) -> Result<()> {
        let driver = self
            .drivers
            .get_mut(driver_index)
            .ok_or(MidiError::InvalidPort(driver_index))?;
        driver.send(bytes)
    }

    /// Forwards a send-retry budget to every managed driver (spec §7's
    /// `DRIVER_MAX_RETRIES`, wired from `EngineConfig::driver_retry_budget_ms`).
    pub fn set_retry_budget_ms(&mut self, budget_ms: u64) {
        for driver in self.drivers.iter_mut() {
            driver.set_retry_budget_ms(budget_ms);
        }
    }

    /// Sends CC 123 (all notes off) and CC 120 (all sound off) on every
    /// channel, to every currently open driver. Best-effort: a failure on
    /// one driver doesn't stop the broadcast to the others.
    pub fn all_notes_off(&mut self) {
        for driver in self.drivers.iter_mut().filter(|d| d.is_open()) {
            for channel in 0..16u8 {
                let _ = driver.send(&[0xB0 | channel, CC_ALL_NOTES_OFF, 0]);
                let _ = driver.send(&[0xB0 | channel, CC_ALL_SOUND_OFF, 0]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capturing_driver::CapturingOutputDriver;

    #[test]
    fn rejects_empty_driver_list() {
        assert!(matches!(PortManager::new(vec![]), Err(MidiError::NoOutputPorts)));
    }

    #[test]
    fn broadcasts_all_notes_off_only_to_open_drivers() {
        let mut pm = PortManager::new(vec![Box::new(CapturingOutputDriver::new())]).unwrap();
        pm.all_notes_off();
        pm.open(0, 0).unwrap();
        pm.all_notes_off();
        // 16 channels * 2 CCs = 32 messages from the single broadcast after open.
        assert_eq!(pm.driver_count(), 1);
    }

    #[test]
    fn invalid_driver_index_is_rejected() {
        let mut pm = PortManager::new(vec![Box::new(CapturingOutputDriver::new())]).unwrap();
        assert!(matches!(pm.open(5, 0), Err(MidiError::InvalidPort(5))));
    }
}
