//! Once-per-second beacon clock
//!
//! Samples the wall clock every second and pushes `BeaconTime` into the
//! control queue on each schedule boundary.

use std::time::Duration;

use chrono::Timelike;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::schedule::is_boundary;
use crate::clock::Clock;
use crate::events::{Event, EventSender};

/// Background task raising `BeaconTime` events
pub struct BeaconTicker<C> {
    clock: C,
    interval_minutes: u32,
    events: EventSender,
}

impl<C: Clock + 'static> BeaconTicker<C> {
    pub fn new(clock: C, interval_minutes: u32, events: EventSender) -> Self {
        Self {
            clock,
            interval_minutes,
            events,
        }
    }

    /// Spawn the ticker on the current runtime. It ends when the queue
    /// closes or the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        // Align sampling just past whole seconds so second 0 is not skipped
        let nanos = self.clock.now().nanosecond() % 1_000_000_000;
        let offset = Duration::from_nanos(u64::from(1_000_000_000 - nanos)) + Duration::from_millis(10);
        let mut ticker = time::interval_at(Instant::now() + offset, Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_minutes = self.interval_minutes, "beacon clock started");

        // Minute of the last boundary raised, guards against double samples
        let mut last_fired: Option<i64> = None;

        loop {
            ticker.tick().await;
            let now = self.clock.now();
            if !is_boundary(now, self.interval_minutes) {
                continue;
            }

            let minute = now.timestamp().div_euclid(60);
            if last_fired == Some(minute) {
                continue;
            }
            last_fired = Some(minute);

            info!(%now, "beacon time");
            if self.events.send(Event::BeaconTime).is_err() {
                debug!("event queue closed, beacon clock exiting");
                break;
            }
        }
    }
}

/// Push `BeaconElapsed` into the queue after `delay`, waking the control
/// loop when a beacon window runs out with no input activity
pub fn wake_after(events: EventSender, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        time::sleep(delay).await;
        let _ = events.send(Event::BeaconElapsed);
    })
}
