//! Periodic task scheduling for DAQ transmission
//!
//! [`TokioTimebase`] drives ticks from a Tokio runtime, [`ManualTimebase`]
//! advances a virtual clock so DAQ emission can be tested step by step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Work run once per period
pub type Tick = Box<dyn FnMut() + Send + 'static>;

/// Source of periodic ticks
pub trait Timebase: Send + Sync {
    /// DAQ base cycle; a list period is prescaler times this
    fn base_cycle(&self) -> Duration;

    /// Run `tick` every `interval` until the handle is cancelled or dropped
    fn schedule_every(&self, interval: Duration, tick: Tick) -> CancelHandle;
}

/// Cancels a scheduled task, on request or when dropped
#[derive(Debug)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl CancelHandle {
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            task: None,
        }
    }

    fn with_task(cancelled: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            cancelled,
            task: Some(task),
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Timebase backed by `tokio::time::interval`
pub struct TokioTimebase {
    handle: Handle,
    base_cycle: Duration,
}

impl TokioTimebase {
    pub fn new(handle: Handle, base_cycle: Duration) -> Self {
        Self { handle, base_cycle }
    }

    /// Timebase on the runtime of the calling task
    pub fn current(base_cycle: Duration) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, base_cycle))
    }
}

impl Timebase for TokioTimebase {
    fn base_cycle(&self) -> Duration {
        self.base_cycle
    }

    fn schedule_every(&self, interval: Duration, mut tick: Tick) -> CancelHandle {
        let period = interval.max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                tick();
            }
        });

        CancelHandle::with_task(cancelled, task)
    }
}

struct Timer {
    interval: Duration,
    due: Duration,
    tick: Tick,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    timers: Vec<Timer>,
}

/// Virtual clock advanced explicitly by the caller
pub struct ManualTimebase {
    base_cycle: Duration,
    clock: Mutex<Clock>,
}

impl ManualTimebase {
    pub fn new(base_cycle: Duration) -> Self {
        Self {
            base_cycle,
            clock: Mutex::new(Clock::default()),
        }
    }

    /// Elapsed virtual time
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of scheduled tasks not yet cancelled
    pub fn active(&self) -> usize {
        let mut clock = self.clock.lock();
        clock.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
        clock.timers.len()
    }

    /// Advance the clock, running every tick that falls due in time order
    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock.lock();
        let target = clock.now + by;

        loop {
            clock.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
            let next = clock
                .timers
                .iter_mut()
                .filter(|t| t.due <= target)
                .min_by_key(|t| t.due);
            let Some(timer) = next else {
                break;
            };
            let due = timer.due;
            timer.due += timer.interval;
            (timer.tick)();
            clock.now = due;
        }

        clock.now = target;
    }

    /// Advance by `cycles` base cycles
    pub fn advance_cycles(&self, cycles: u32) {
        self.advance(self.base_cycle * cycles);
    }
}

impl Timebase for ManualTimebase {
    fn base_cycle(&self) -> Duration {
        self.base_cycle
    }

    fn schedule_every(&self, interval: Duration, tick: Tick) -> CancelHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock.lock();
        if !interval.is_zero() {
            let due = clock.now + interval;
            clock.timers.push(Timer {
                interval,
                due,
                tick,
                cancelled: cancelled.clone(),
            });
        }
        CancelHandle::new(cancelled)
    }
}
