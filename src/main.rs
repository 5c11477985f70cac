//! repeater-cor: carrier-operated relay controller for a linked repeater
//!
//! Watches the local and remote receiver carrier-detect lines and keys the
//! local and remote transmitters accordingly:
//! - Local carrier: retransmitted on both legs
//! - Remote carrier: retransmitted locally
//! - Identification beacon every N minutes, deferred while a QSO is active
//!
//! Components:
//! - Edge watcher thread and 1 Hz beacon clock feeding one event queue
//! - Control loop running the state machine on each wake-up
//! - Fire-and-forget beacon playback through an external player

mod beacon;
mod clock;
mod config;
mod driver;
mod events;
mod hal;
mod lifecycle;
mod state;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::beacon::{BeaconSchedule, BeaconTicker, CommandPlayer};
use crate::clock::SystemClock;
use crate::config::{Config, HalKind};
use crate::driver::CycleDriver;
use crate::events::Event;
use crate::hal::{EdgeWatcher, Gpio, InputPin, MemoryGpio, SysfsGpio};
use crate::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "repeater-cor starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        hal = ?config.hal,
        lines = ?config.lines,
        player = %config.player,
        beacon = %config.beacon_file,
        "configuration loaded"
    );

    // Termination handlers first, so a signal during startup is not fatal
    let shutdown = ShutdownSignal::install()?;

    // Single control queue: edge watcher, beacon clock, shutdown -> control loop
    let (event_tx, event_rx) = events::queue();

    let gpio: Arc<dyn Gpio> = match config.hal {
        HalKind::Sysfs => Arc::new(SysfsGpio::open(
            &config.gpio_root,
            config.lines,
            config.active_low,
        )?),
        HalKind::Sim => {
            warn!("simulated gpio, no transmitter will be keyed");
            Arc::new(MemoryGpio::new())
        }
    };

    // Input edges (runs on dedicated thread)
    let mut watcher = EdgeWatcher::new(Arc::clone(&gpio), config.poll_interval);
    for pin in InputPin::ALL {
        let tx = event_tx.clone();
        watcher.subscribe(pin, move |level| {
            let _ = tx.send(Event::from_edge(pin, level));
        });
    }
    watcher.start()?;
    info!("edge watcher started");

    let schedule = BeaconSchedule::new(config.beacon_interval_minutes, config.beacon_duration);
    info!(
        interval_minutes = schedule.interval_minutes(),
        window_secs = schedule.window().as_secs(),
        "beacon schedule"
    );

    let ticker = BeaconTicker::new(SystemClock, config.beacon_interval_minutes, event_tx.clone()).spawn();
    let signal_task = shutdown.forward(event_tx.clone());

    let driver = CycleDriver::new(
        Arc::clone(&gpio),
        CommandPlayer::new(&config.player),
        SystemClock,
        schedule,
        config.beacon_file.clone(),
        event_tx,
    );

    info!("controller initialized, entering main loop");
    let final_state = driver.run(event_rx).await;

    // Cleanup
    info!("shutting down...");

    ticker.abort();
    signal_task.abort();
    // Joins the watcher thread and drops its gpio handle
    drop(watcher);
    // Last handle: sysfs lines are released on drop
    drop(gpio);

    info!(%final_state, "repeater-cor stopped");

    Ok(())
}
