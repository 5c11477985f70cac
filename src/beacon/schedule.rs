//! Beacon window bookkeeping
//!
//! `beaconTime` is not a sticky flag: it is recomputed on every cycle. A
//! wall-clock boundary arms the schedule; the window stays open while the
//! beacon waits for clear receivers and then for `window` after the audio
//! started. Past that point the schedule disarms itself.
//!
//! Only boundary detection reads the wall clock. The window itself is
//! measured on the monotonic clock, so stepping the system time cannot
//! stretch it.

use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::time::Instant;
use tracing::debug;

/// True at second 0 of every minute that is a multiple of `interval_minutes`
pub fn is_boundary(now: DateTime<Local>, interval_minutes: u32) -> bool {
    now.second() == 0 && now.minute() % interval_minutes == 0
}

fn minute_of(now: DateTime<Local>) -> i64 {
    now.timestamp().div_euclid(60)
}

/// Pending-beacon state for the control loop
#[derive(Debug, Clone)]
pub struct BeaconSchedule {
    interval_minutes: u32,
    window: Duration,
    pending_since: Option<DateTime<Local>>,
    started_at: Option<Instant>,
    /// Minute of the last boundary that armed the schedule
    last_boundary: Option<i64>,
}

impl BeaconSchedule {
    pub fn new(interval_minutes: u32, window: Duration) -> Self {
        Self {
            interval_minutes,
            window,
            pending_since: None,
            started_at: None,
            last_boundary: None,
        }
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// How long the beacon keeps the transmitter after the audio starts
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a schedule boundary. Returns false if a beacon was already
    /// pending, in which case the boundaries merge into one beacon.
    pub fn arm(&mut self, now: DateTime<Local>) -> bool {
        self.expire();
        self.last_boundary = Some(minute_of(now));
        if let Some(since) = self.pending_since {
            debug!(%since, "beacon already pending");
            return false;
        }
        debug!(%now, "beacon armed");
        self.pending_since = Some(now);
        true
    }

    /// Arm the schedule if `now` falls on a boundary not seen yet.
    /// Covers a lost or late tick.
    pub fn observe(&mut self, now: DateTime<Local>) -> bool {
        if !is_boundary(now, self.interval_minutes) || self.last_boundary == Some(minute_of(now)) {
            return false;
        }
        self.arm(now)
    }

    /// Record the start of playback
    pub fn started(&mut self) {
        if self.pending_since.is_some() && self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Recompute the beacon window signal
    pub fn beacon_time(&mut self) -> bool {
        self.expire();
        self.pending_since.is_some()
    }

    /// Time left in a window whose audio has started
    pub fn remaining(&self) -> Option<Duration> {
        let started = self.started_at?;
        Some(self.window.saturating_sub(started.elapsed()))
    }

    fn expire(&mut self) {
        let Some(started) = self.started_at else {
            return;
        };
        if started.elapsed() >= self.window {
            debug!("beacon window closed");
            self.pending_since = None;
            self.started_at = None;
        }
    }
}
