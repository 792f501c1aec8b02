//! Concrete [`OutputDriver`] built on `midir`.
//!
//! Grounded directly on `midi/src/lib.rs`'s `MidiOutputHandler`: port
//! enumeration via `midir::MidiOutput::ports`, connect-by-index, and a
//! swap-the-handle-in-and-out-of-an-`Option` dance because `midir` hands
//! back a different type once a port is connected.

use std::time::{Duration, Instant};

use midir::{MidiOutput, MidiOutputConnection};

use crate::driver::{OutputDriver, PortDescriptor};
use crate::error::{MidiError, Result};

/// Default retry budget (spec §7's `DRIVER_MAX_RETRIES ≈ 100 ms`): how long
/// [`MidirOutputDriver::send`] keeps retrying a failed write before logging
/// a drop and giving up, rather than a fixed attempt count — a slow or
/// congested port should get roughly the same wall-clock grace regardless
/// of how long each individual attempt takes.
const DEFAULT_RETRY_BUDGET_MS: u64 = 100;
const RETRY_BACKOFF: Duration = Duration::from_millis(2);

enum Handle {
    Disconnected(MidiOutput),
    Connected(MidiOutputConnection),
    /// Only occupied transiently inside a method body, while swapping
    /// between the two states above (`midir`'s API consumes `self` on
    /// both connect and close).
    Empty,
}

pub struct MidirOutputDriver {
    handle: Handle,
    client_name: &'static str,
    retry_budget: Duration,
}

impl MidirOutputDriver {
    pub fn new(client_name: &'static str) -> Result<Self> {
        let output = MidiOutput::new(client_name).map_err(|e| MidiError::Open(e.to_string()))?;
        Ok(Self {
            handle: Handle::Disconnected(output),
            client_name,
            retry_budget: Duration::from_millis(DEFAULT_RETRY_BUDGET_MS),
        })
    }
}

impl OutputDriver for MidirOutputDriver {
    fn ports(&self) -> Vec<PortDescriptor> {
        match &self.handle {
            Handle::Disconnected(out) => out
                .ports()
                .iter()
                .enumerate()
                .map(|(index, port)| PortDescriptor {
                    index,
                    name: out.port_name(port).unwrap_or_else(|_| "[unnamed]".into()),
                })
                .collect(),
            // `midir` won't enumerate ports while connected; the caller is
            // expected to read ports before opening one.
            Handle::Connected(_) | Handle::Empty => Vec::new(),
        }
    }

    fn open(&mut self, index: usize) -> Result<()> {
        let out = match std::mem::replace(&mut self.handle, Handle::Empty) {
            Handle::Disconnected(out) => out,
            other => {
                self.handle = other;
                return Err(MidiError::PortAlreadyOpen);
            }
        };
        let ports = out.ports();
        let Some(port) = ports.get(index) else {
            self.handle = Handle::Disconnected(out);
            return Err(MidiError::InvalidPort(index));
        };
        match out.connect(port, self.client_name) {
            Ok(conn) => {
                self.handle = Handle::Connected(conn);
                Ok(())
            }
            Err(err) => Err(MidiError::Open(err.to_string())),
        }
    }

    fn close(&mut self) {
        if let Handle::Connected(conn) = std::mem::replace(&mut self.handle, Handle::Empty) {
            self.handle = Handle::Disconnected(conn.close());
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.handle, Handle::Connected(_))
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let Handle::Connected(conn) = &mut self.handle else {
            return Err(MidiError::Send("no port open".into()));
        };
        let deadline = Instant::now() + self.retry_budget;
        let mut attempt = 0u32;
        loop {
            match conn.send(bytes) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    log::warn!("MIDI send attempt {attempt} failed: {err}");
                    if Instant::now() >= deadline {
                        log::warn!(
                            "dropping MIDI message after {attempt} failed sends over {:?}: {err}",
                            self.retry_budget
                        );
                        return Err(MidiError::DriverBusy);
                    }
                    std::thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    fn set_retry_budget_ms(&mut self, budget_ms: u64) {
        self.retry_budget = Duration::from_millis(budget_ms);
    }
}
