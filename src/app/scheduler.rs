//! Status poll scheduling.
//!
//! Provides a [`PollScheduler`] trait and a default [`IntervalScheduler`]
//! implementation that ticks at a fixed interval.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Default poll interval (5 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct PollSchedulerConfig {
    /// Interval between status polls.
    pub poll_interval: Duration,
}

impl Default for PollSchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Controls when the next status poll fires.
#[async_trait]
pub trait PollScheduler: Send + Sync {
    /// Wait until the next poll should run.
    async fn next_tick(&mut self);
}

pub struct IntervalScheduler {
    interval: tokio::time::Interval,
}

impl IntervalScheduler {
    /// The first tick fires one full interval after creation; the initial
    /// load is issued separately.
    pub fn new(config: PollSchedulerConfig) -> Self {
        let start = tokio::time::Instant::now() + config.poll_interval;
        let mut interval = tokio::time::interval_at(start, config.poll_interval);
        // A slow poll must not be followed by a burst of catch-up polls.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl PollScheduler for IntervalScheduler {
    async fn next_tick(&mut self) {
        self.interval.tick().await;
    }
}
