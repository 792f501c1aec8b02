//! Hardware MIDI driver boundary: the `OutputDriver`/`InputDriver` traits,
//! a `midir`-backed implementation, and an in-memory recording double for
//! tests and embedders that want to capture output instead of opening
//! hardware.

pub mod capturing_driver;
pub mod driver;
pub mod error;
pub mod midir_driver;
pub mod port_manager;

pub use capturing_driver::CapturingOutputDriver;
pub use driver::{InputDriver, OutputDriver, PortDescriptor};
pub use error::{MidiError, Result};
pub use midir_driver::MidirOutputDriver;
pub use port_manager::PortManager;
