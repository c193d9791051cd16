//! Duration display for a running session
//!
//! The timer lives inside the Recording state: it is created when recording
//! begins and dropped on every transition out of it, so no tick can outlive
//! the session that started it.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Format whole seconds as M:SS (minutes unbounded, seconds zero-padded)
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Parse an M:SS duration back into seconds
pub fn parse_time(text: &str) -> Option<u64> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    if seconds.len() != 2 {
        return None;
    }
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some(minutes * 60 + seconds)
}

/// One-second counter scoped to a Recording state
#[derive(Debug)]
pub struct DurationTimer {
    started_at: Instant,
    interval: Interval,
}

impl DurationTimer {
    /// Start counting from `started_at`; the first tick fires one second later
    pub fn start(started_at: Instant) -> Self {
        let mut interval = interval_at(started_at + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            started_at,
            interval,
        }
    }

    /// Wait for the next tick and return whole seconds elapsed since start
    pub async fn tick(&mut self) -> u64 {
        self.interval.tick().await;
        self.elapsed_seconds()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Await the next tick of an optional timer; pending forever when absent
pub(crate) async fn next_tick(timer: &mut Option<DurationTimer>) -> u64 {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}
