//! Edge notifications for the receiver inputs
//!
//! sysfs offers no portable callback without `poll(2)` on the value file,
//! so a dedicated thread samples both inputs at a fixed period and invokes
//! the subscribed callbacks on every level change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{Gpio, InputPin};

type EdgeCallback = Box<dyn Fn(bool) + Send + 'static>;

/// Errors that can occur when starting the watcher
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("edge watcher is already running")]
    AlreadyRunning,

    #[error("failed to spawn watcher thread: {0}")]
    ThreadSpawn(String),
}

/// Polls input lines and reports level transitions
pub struct EdgeWatcher {
    gpio: Arc<dyn Gpio>,
    period: Duration,
    subscribers: Vec<(InputPin, EdgeCallback)>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EdgeWatcher {
    /// Create a watcher sampling every `period`
    pub fn new(gpio: Arc<dyn Gpio>, period: Duration) -> Self {
        Self {
            gpio,
            period,
            subscribers: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Register `callback` for level changes on `pin`. The callback gets
    /// the new level and runs on the watcher thread.
    pub fn subscribe(&mut self, pin: InputPin, callback: impl Fn(bool) + Send + 'static) {
        self.subscribers.push((pin, Box::new(callback)));
    }

    /// Spawn the sampling thread. Subscriptions are moved into it.
    ///
    /// Levels are snapshotted before this returns, so any change made
    /// afterwards is reported as an edge.
    pub fn start(&mut self) -> Result<(), WatcherError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WatcherError::AlreadyRunning);
        }

        // Seed with the current levels so startup does not look like an edge
        let tracks = InputPin::ALL.map(|pin| LineTrack {
            level: self.gpio.read_input(pin).unwrap_or(false),
            failing: false,
        });

        let gpio = Arc::clone(&self.gpio);
        let running = Arc::clone(&self.running);
        let subscribers = std::mem::take(&mut self.subscribers);
        let period = self.period;

        let handle = thread::Builder::new()
            .name("edge-watcher".to_string())
            .spawn(move || {
                info!(?period, "edge watcher thread started");
                run_poll_loop(gpio.as_ref(), tracks, &subscribers, period, &running);
                running.store(false, Ordering::SeqCst);
                info!("edge watcher thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                WatcherError::ThreadSpawn(e.to_string())
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop sampling and wait for the thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("edge watcher thread panicked");
            }
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EdgeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LineTrack {
    level: bool,
    failing: bool,
}

fn run_poll_loop(
    gpio: &dyn Gpio,
    mut tracks: [LineTrack; 2],
    subscribers: &[(InputPin, EdgeCallback)],
    period: Duration,
    running: &AtomicBool,
) {
    while running.load(Ordering::SeqCst) {
        thread::sleep(period);

        for (idx, pin) in InputPin::ALL.into_iter().enumerate() {
            let track = &mut tracks[idx];
            let level = match gpio.read_input(pin) {
                Ok(level) => {
                    if track.failing {
                        info!(?pin, "input readable again");
                        track.failing = false;
                    }
                    level
                }
                Err(e) => {
                    // Report once per failure streak
                    if !track.failing {
                        warn!(?pin, %e, "failed to sample input");
                        track.failing = true;
                    }
                    continue;
                }
            };

            if level == track.level {
                continue;
            }

            debug!(?pin, level, "input edge");
            track.level = level;
            for (_, callback) in subscribers.iter().filter(|(p, _)| *p == pin) {
                callback(level);
            }
        }
    }
}
