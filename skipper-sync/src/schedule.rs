//! Clock and sleep abstraction for build polling.

use std::time::{Duration, Instant};

/// Default pause between polling sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of sleeps and elapsed time for a polling loop.
pub trait Scheduler {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);

    /// Time since the scheduler was created.
    fn elapsed(&self) -> Duration;
}

/// Real clock; sleeps the current thread.
#[derive(Debug)]
pub struct ThreadScheduler {
    started: Instant,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Virtual clock: sleeping advances time instantly and is recorded.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }
}

impl Scheduler for ManualScheduler {
    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
        self.sleeps.push(duration);
    }

    fn elapsed(&self) -> Duration {
        self.now
    }
}

/// How often to poll and how long to wait at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits until every build finishes.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl PollPolicy {
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Whether a run that has been waiting for `waited` must give up.
    pub fn expired(&self, waited: Duration) -> bool {
        self.max_wait.is_some_and(|max| waited >= max)
    }
}
