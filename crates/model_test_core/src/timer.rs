//! crates/model_test_core/src/timer.rs
//!
//! The attempt countdown. It ticks once per second on the tokio clock and
//! reports expiry exactly once. The server recomputes elapsed time on resume,
//! so drift against the wall clock is tolerated.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Full duration of an attempt in seconds.
pub fn total_seconds(time_limit_minutes: u32) -> u64 {
    u64::from(time_limit_minutes) * 60
}

/// Seconds left for an attempt started at `start_time`, never negative.
/// A start time in the future (clock skew) counts as zero elapsed.
pub fn remaining_seconds(
    time_limit_minutes: u32,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u64 {
    let elapsed = (now - start_time).num_seconds().max(0) as u64;
    total_seconds(time_limit_minutes).saturating_sub(elapsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Running,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    /// Returned once, on the transition to `Expired`.
    Expired,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    phase: TimerPhase,
}

impl Countdown {
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining,
            phase: TimerPhase::Running,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn tick(&mut self) -> Tick {
        if self.phase == TimerPhase::Expired {
            return Tick::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.phase = TimerPhase::Expired;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Expired,
    Cancelled,
}

/// Drives `countdown` until it expires or `cancel` fires, publishing every
/// new remaining value on `remaining_tx`.
pub async fn run_countdown(
    mut countdown: Countdown,
    remaining_tx: watch::Sender<u64>,
    cancel: CancellationToken,
) -> CountdownOutcome {
    if cancel.is_cancelled() {
        return CountdownOutcome::Cancelled;
    }
    if countdown.remaining() == 0 {
        countdown.tick();
        remaining_tx.send_replace(0);
        info!("Countdown started with no time left.");
        return CountdownOutcome::Expired;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(remaining = countdown.remaining(), "Countdown cancelled.");
                return CountdownOutcome::Cancelled;
            }
            _ = interval.tick() => match countdown.tick() {
                Tick::Running(remaining) => {
                    remaining_tx.send_replace(remaining);
                }
                Tick::Expired => {
                    remaining_tx.send_replace(0);
                    info!("Countdown expired.");
                    return CountdownOutcome::Expired;
                }
                Tick::Stopped => return CountdownOutcome::Expired,
            },
        }
    }
}
