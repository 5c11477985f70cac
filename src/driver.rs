//! Control loop
//!
//! Each cycle samples the receivers, runs the transition function, drives
//! the transmitters and dispatches the beacon audio. A cycle that changed
//! state is followed at once by another one; otherwise the loop blocks on
//! the event queue until something happens.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::beacon::{wake_after, BeaconSchedule, Player};
use crate::clock::Clock;
use crate::events::{Event, EventReceiver, EventSender};
use crate::hal::{Gpio, HalError, InputPin, OutputPin};
use crate::state::{ControllerState, Outputs, SideEffect, State};

/// Slack added to the beacon wake-up so the window has closed when the
/// loop re-evaluates
const WAKE_MARGIN: Duration = Duration::from_millis(250);

/// Orchestrates sample, decide, apply, react, wait
pub struct CycleDriver<G, P, C> {
    gpio: G,
    player: P,
    clock: C,
    schedule: BeaconSchedule,
    beacon_resource: String,
    events: EventSender,
    controller: ControllerState,
    wake_pending: bool,
}

impl<G: Gpio, P: Player, C: Clock> CycleDriver<G, P, C> {
    pub fn new(
        gpio: G,
        player: P,
        clock: C,
        schedule: BeaconSchedule,
        beacon_resource: impl Into<String>,
        events: EventSender,
    ) -> Self {
        Self {
            gpio,
            player,
            clock,
            schedule,
            beacon_resource: beacon_resource.into(),
            events,
            controller: ControllerState::new(),
            wake_pending: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.controller.state()
    }

    #[cfg(test)]
    pub fn outputs(&self) -> Outputs {
        self.controller.outputs()
    }

    /// Run until shutdown drives the controller through `Deinit` to `Off`
    pub async fn run(mut self, mut events: EventReceiver) -> State {
        info!("control loop started");
        self.controller.start();

        loop {
            let reevaluate = self.cycle();
            if !self.controller.state().is_running() {
                break;
            }
            if reevaluate {
                debug!(state = %self.controller.state(), "re-evaluating");
                tokio::task::yield_now().await;
                continue;
            }

            debug!(phase = "wait", state = %self.controller.state(), "waiting for event");
            match events.recv().await {
                Some(event) => self.on_event(event),
                None => {
                    warn!("event queue closed");
                    self.controller.request_shutdown();
                }
            }
        }

        if let Err(e) = self.gpio.release_all() {
            error!(%e, "failed to release transmitters on exit");
        }
        info!(cycles = self.controller.cycles(), "control loop stopped");
        self.controller.state()
    }

    /// Fold a queued event into the loop state. Input edges carry no
    /// payload the loop trusts: levels are re-sampled on the next cycle.
    pub fn on_event(&mut self, event: Event) {
        debug!(%event, "event received");
        match event {
            Event::RxLocalOpen | Event::RxLocalClose | Event::RxRemoteOpen | Event::RxRemoteClose => {}
            Event::BeaconTime => {
                self.schedule.arm(self.clock.now());
            }
            Event::BeaconElapsed => self.wake_pending = false,
            Event::Shutdown => {
                info!(state = %self.controller.state(), "shutdown requested");
                self.controller.request_shutdown();
            }
        }
    }

    /// One control cycle. Returns true when the state changed and the
    /// loop must evaluate again without waiting for an event.
    pub fn cycle(&mut self) -> bool {
        let now = self.clock.now();
        let before = self.controller.state();

        // Sample
        let rx_local = self.sample(InputPin::RxLocal);
        let rx_remote = self.sample(InputPin::RxRemote);
        self.schedule.observe(now);
        let beacon_time = self.schedule.beacon_time();
        debug!(phase = "sample", rx_local, rx_remote, beacon_time, "inputs sampled");

        // Decide
        let decision = self.controller.decide(rx_local, rx_remote, beacon_time);
        debug!(
            phase = "decide",
            state = %decision.next,
            tx_local = decision.outputs.tx_local,
            tx_remote = decision.outputs.tx_remote,
            beacon_playing = decision.beacon_playing,
            "decision made"
        );

        // Apply
        if let Err(e) = self.apply(decision.outputs) {
            error!(%e, "failed to drive transmitters, releasing");
            self.controller.commit_released(decision);
            self.fail_safe();
            self.log_report();
            return false;
        }
        self.controller.commit(decision);
        debug!(phase = "apply", "outputs applied");

        // React
        if let Some(SideEffect::PlayBeacon) = decision.side_effect {
            info!(resource = %self.beacon_resource, "starting beacon");
            self.schedule.started();
            self.player.play_async(&self.beacon_resource);
            debug!(phase = "side_effect", "beacon dispatched");
        }
        if decision.next == State::Beacon && decision.beacon_playing {
            self.arm_wake();
        }

        self.log_report();
        decision.next != before
    }

    fn sample(&self, pin: InputPin) -> bool {
        match self.gpio.read_input(pin) {
            Ok(level) => level,
            Err(e) => {
                // No carrier is the safe assumption
                error!(?pin, %e, "failed to read input");
                false
            }
        }
    }

    fn apply(&self, outputs: Outputs) -> Result<(), HalError> {
        self.gpio.write_output(OutputPin::TxLocal, outputs.tx_local)?;
        self.gpio.write_output(OutputPin::TxRemote, outputs.tx_remote)?;
        Ok(())
    }

    fn fail_safe(&self) {
        if let Err(e) = self.gpio.release_all() {
            error!(%e, "failed to release transmitters");
        }
    }

    /// Make sure the loop wakes when the running beacon window closes
    fn arm_wake(&mut self) {
        if self.wake_pending {
            return;
        }
        if let Some(remaining) = self.schedule.remaining() {
            wake_after(self.events.clone(), remaining + WAKE_MARGIN);
            self.wake_pending = true;
        }
    }

    fn log_report(&self) {
        match serde_json::to_string(&self.controller.report()) {
            Ok(line) => debug!(report = %line, "cycle complete"),
            Err(e) => warn!(%e, "failed to encode cycle report"),
        }
    }
}
