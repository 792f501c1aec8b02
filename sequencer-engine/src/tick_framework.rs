//! C9 — Tick Component Framework.
//!
//! Grounded on `examples/original_source/include/advancedsequencer.h`'s
//! tick-component registration (a priority-ordered list of callbacks driven
//! once per hardware tick), adapted to a `std::thread`-driven wall-clock
//! loop since the teacher's own clock (`core/src/time.rs`'s `Clock`) is
//! sample-driven rather than wall-clock-driven and doesn't cover this.
//!
//! Device time and system time are kept separate so a component can be fed
//! a "device" clock that's paused, scaled, or offset from the wall clock
//! without the framework's thread caring: `dev_ms = sys_ms - sys_offset +
//! dev_offset`. Both offsets are stored as atomics rather than captured once
//! by the driving thread's closure, so [`TickComponentFramework::set_device_time_offset`]
//! and [`TickComponentFramework::set_system_time_offset`] can re-anchor the
//! mapping while the thread is already running (spec §4.5/§4.6: loop,
//! seek, and count-in completion all reset this mapping mid-flight).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// One periodic callback. Registered components run in ascending priority
/// order on every tick.
pub trait TickComponent: Send {
    fn tick(&mut self, dev_ms: u64);
}

struct Registered {
    priority: i32,
    component: Box<dyn TickComponent>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Owns a priority-ordered set of [`TickComponent`]s and drives them from a
/// dedicated thread at roughly `tick_period`.
pub struct TickComponentFramework {
    components: Vec<Registered>,
    dev_offset: Arc<AtomicU64>,
    sys_offset: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Default for TickComponentFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl TickComponentFramework {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            dev_offset: Arc::new(AtomicU64::new(0)),
            sys_offset: Arc::new(AtomicU64::new(now_ms())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Registers a component. Must be called before [`Self::start`]; once
    /// the framework's thread is running, the component list has already
    /// been handed off to it.
    pub fn register(&mut self, priority: i32, component: Box<dyn TickComponent>) {
        self.components.push(Registered { priority, component });
        self.components.sort_by_key(|r| r.priority);
    }

    /// Sets `dev_offset` in `dev_ms = sys_ms - sys_offset + dev_offset`.
    /// Takes effect on the driving thread's very next cycle, whether or not
    /// it's already running.
    pub fn set_device_time_offset(&mut self, dev_offset: u64) {
        self.dev_offset.store(dev_offset, Ordering::Release);
    }

    /// Sets `sys_offset` in the same mapping. Re-anchoring both offsets
    /// together (`sys_offset = now`, `dev_offset = current position`) makes
    /// `dev_ms` continue from exactly where it left off instead of jumping.
    pub fn set_system_time_offset(&mut self, sys_offset: u64) {
        self.sys_offset.store(sys_offset, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Spawns the driving thread. A no-op if already running.
    pub fn start(&mut self, tick_period: Duration) {
        if self.thread.is_some() {
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        let mut components = std::mem::take(&mut self.components);
        let dev_offset = self.dev_offset.clone();
        let sys_offset = self.sys_offset.clone();
        let stop_flag = self.stop_flag.clone();
        self.thread = Some(std::thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                let cycle_start = Instant::now();
                let sys_ms = now_ms();
                let dev_ms = sys_ms.saturating_sub(sys_offset.load(Ordering::Acquire))
                    + dev_offset.load(Ordering::Acquire);
                for reg in components.iter_mut() {
                    reg.component.tick(dev_ms);
                }
                let elapsed = cycle_start.elapsed();
                if elapsed > tick_period * 2 {
                    log::trace!(
                        "tick cycle took {:?}, more than 2x the configured {:?} period",
                        elapsed,
                        tick_period
                    );
                }
                let sleep = tick_period.saturating_sub(elapsed);
                if !sleep.is_zero() {
                    std::thread::sleep(sleep);
                }
            }
        }));
    }

    /// Signals the driving thread to stop and joins it.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TickComponentFramework {
    fn drop(&mut self) {
        self.stop();
    }
}
