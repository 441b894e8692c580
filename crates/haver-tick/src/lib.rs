//! Per-connection liveness timer.
//!
//! A [`TickScheduler`] hands out one tick per interval. The connection
//! task polls [`TickScheduler::wait_for_tick`] as one branch of its
//! `tokio::select!`, runs the liveness check when it resolves, and goes
//! back to reading. Nothing is spawned; the timer dies with the task.
//!
//! Ticks never pile up. If the task was busy past several deadlines, the
//! next tick reports how many were missed and the schedule restarts from
//! the moment it fired. A liveness check only cares about "now", so
//! replaying old deadlines would just send redundant pings.
//!
//! An interval of zero turns the timer off: `wait_for_tick` never
//! resolves, which leaves the `select!` branch permanently idle.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Timer settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Zero disables the timer.
    pub interval: Duration,
    /// Upper bound of a random delay added to the first tick, so that
    /// connections accepted in a burst spread their checks out.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl TickConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    fn first_delay(&self) -> Duration {
        let bound = self.initial_jitter.as_micros() as u64;
        if bound == 0 {
            return self.interval;
        }
        self.interval + Duration::from_micros(rand::rng().random_range(0..bound))
    }
}

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Sequence number, starting at 1.
    pub tick: u64,
    /// Whole intervals that passed without a tick being observed.
    pub missed: u64,
}

#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    fired: u64,
    deadline: Option<Instant>,
}

impl TickScheduler {
    /// Arms the timer. The first tick is due one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let deadline = if config.interval.is_zero() {
            debug!("liveness timer off");
            None
        } else {
            let delay = config.first_delay();
            debug!(interval = ?config.interval, first = ?delay, "liveness timer armed");
            Some(Instant::now() + delay)
        };

        Self {
            interval: config.interval,
            fired: 0,
            deadline,
        }
    }

    /// Resolves at the next deadline.
    ///
    /// Dropping the future early (another `select!` branch won) leaves the
    /// deadline untouched, so the following call waits for the same tick.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        let now = Instant::now();
        let overdue = now.saturating_duration_since(deadline);
        let missed = (overdue.as_nanos() / self.interval.as_nanos()) as u64;
        self.fired += 1;
        self.deadline = Some(now + self.interval);

        if missed > 0 {
            warn!(tick = self.fired, missed, "liveness timer fell behind");
        } else {
            trace!(tick = self.fired, "tick");
        }

        TickInfo {
            tick: self.fired,
            missed,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.deadline.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.fired
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
