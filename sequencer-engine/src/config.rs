//! Tunables that spec.md names as fixed constants, grouped into a struct
//! (SPEC_FULL.md ambient-stack note: a `Default`-backed config struct is
//! the idiomatic replacement for the `#define`-style constants in
//! `advancedsequencer.h`, not a file-based configuration system).

/// Engine tunables, with defaults matching the values spec.md states.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Target period between timer-thread ticks, in milliseconds.
    pub tick_period_ms: u64,
    /// Maximum events dispatched from a single `tick()` call, bounding how
    /// much catch-up work one call can do after a long scheduling gap.
    pub max_events_per_tick: usize,
    /// How many milliseconds a driver write may keep retrying before the
    /// engine gives up on that message and logs a drop.
    pub driver_retry_budget_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1,
            max_events_per_tick: 100,
            driver_retry_budget_ms: 100,
        }
    }
}
