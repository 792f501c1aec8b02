//! Real-time tick-driven MIDI sequencer engine: a single mutex-guarded
//! driver that a timer thread ticks and a control thread steers.

pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod tick_framework;

pub use config::EngineConfig;
pub use engine::{EngineTickAdapter, PlayMode, SequencerEngine};
pub use error::{EngineError, Result};
pub use notifier::{ChannelNotifier, Notification, NotifyGroup, Notifier, NullNotifier};
pub use tick_framework::{TickComponent, TickComponentFramework};
