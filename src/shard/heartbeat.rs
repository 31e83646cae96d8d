//! Heartbeat scheduling
//!
//! The scheduler owns at most one periodic timer. Starting a timer drops the
//! previous one first, so a shard can never run two heartbeat cadences.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Outcome of a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Previous heartbeat was acknowledged; send the next one
    Due,
    /// Previous heartbeat was never acknowledged; the connection is a zombie
    Missed,
}

#[derive(Debug)]
struct Timer {
    interval: Duration,
    ticker: Interval,
    last_sent: Option<Instant>,
    awaiting_ack: bool,
}

#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    timer: Option<Timer>,
    latency: Option<Duration>,
}

impl HeartbeatScheduler {
    /// Start beating at `interval`, first beat one interval from now.
    ///
    /// Returns true when a running timer was cancelled to make room.
    pub fn start(&mut self, interval: Duration) -> bool {
        let replaced = self.stop();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(Timer {
            interval,
            ticker,
            last_sent: None,
            awaiting_ack: false,
        });
        replaced
    }

    /// Cancel the running timer. Returns true if one was running.
    pub fn stop(&mut self) -> bool {
        self.timer.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.timer.as_ref().map(|t| t.interval)
    }

    /// Wait for the next beat. Never resolves while stopped.
    pub async fn tick(&mut self) -> Beat {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.ticker.tick().await;
                if timer.awaiting_ack {
                    Beat::Missed
                } else {
                    Beat::Due
                }
            }
            None => std::future::pending().await,
        }
    }

    pub fn record_sent(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.last_sent = Some(Instant::now());
            timer.awaiting_ack = true;
        }
    }

    /// Record an ack and return the measured round trip
    pub fn record_ack(&mut self) -> Option<Duration> {
        let timer = self.timer.as_mut()?;
        timer.awaiting_ack = false;
        let sent = timer.last_sent?;
        let latency = sent.elapsed();
        self.latency = Some(latency);
        Some(latency)
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn reset_latency(&mut self) {
        self.latency = None;
    }
}
