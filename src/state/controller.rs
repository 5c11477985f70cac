//! Owned controller state
//!
//! Holds the current FSM state and the signals of the last cycle. Only the
//! control task touches it, so no locking is involved.

use serde::Serialize;
use tracing::info;

use super::machine::{step, Decision, Inputs, Outputs, SideEffect, State};

/// Snapshot of one control cycle, logged as a single JSON line
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub state: State,
    pub rx_local: bool,
    pub rx_remote: bool,
    pub beacon_time: bool,
    pub beacon_playing: bool,
    pub tx_local: bool,
    pub tx_remote: bool,
}

/// Current state plus sampled and derived signals
#[derive(Debug, Default)]
pub struct ControllerState {
    state: State,
    inputs: Inputs,
    outputs: Outputs,
    beacon_playing: bool,
    cycles: u64,
}

impl ControllerState {
    /// A controller in `Off`, all signals low
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    #[cfg(test)]
    pub fn outputs(&self) -> Outputs {
        self.outputs
    }

    #[cfg(test)]
    pub fn beacon_playing(&self) -> bool {
        self.beacon_playing
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Enter `Init` at startup
    pub fn start(&mut self) {
        self.enter(State::Init);
    }

    /// Force `Deinit` regardless of the current state
    pub fn request_shutdown(&mut self) {
        if matches!(self.state, State::Off | State::Deinit) {
            return;
        }
        self.enter(State::Deinit);
    }

    /// Run the transition function on freshly sampled levels. Nothing
    /// is committed until the caller has driven the outputs.
    pub fn decide(&mut self, rx_local: bool, rx_remote: bool, beacon_time: bool) -> Decision {
        self.inputs = Inputs {
            rx_local,
            rx_remote,
            beacon_time,
            beacon_playing: self.beacon_playing,
        };
        self.cycles += 1;
        step(self.state, self.inputs)
    }

    /// Commit a decision whose outputs reached the lines
    pub fn commit(&mut self, decision: Decision) {
        if decision.next != self.state {
            self.enter(decision.next);
        }
        self.outputs = decision.outputs;
        self.beacon_playing = decision.beacon_playing;
    }

    /// Commit a decision whose outputs could not be driven. The state
    /// still moves on, but nothing counts as keyed and a beacon that was
    /// about to start is not latched as playing, so it is retried.
    pub fn commit_released(&mut self, decision: Decision) {
        let started_now = decision.side_effect == Some(SideEffect::PlayBeacon);
        self.commit(Decision {
            outputs: Outputs::IDLE,
            beacon_playing: decision.beacon_playing && !started_now,
            side_effect: None,
            ..decision
        });
    }

    pub fn report(&self) -> CycleReport {
        CycleReport {
            cycle: self.cycles,
            state: self.state,
            rx_local: self.inputs.rx_local,
            rx_remote: self.inputs.rx_remote,
            beacon_time: self.inputs.beacon_time,
            beacon_playing: self.beacon_playing,
            tx_local: self.outputs.tx_local,
            tx_remote: self.outputs.tx_remote,
        }
    }

    fn enter(&mut self, next: State) {
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(cs: &mut ControllerState, rx_local: bool, rx_remote: bool, beacon_time: bool) -> Decision {
        let d = cs.decide(rx_local, rx_remote, beacon_time);
        cs.commit(d);
        d
    }

    #[test]
    fn test_initial_state() {
        let cs = ControllerState::new();
        assert_eq!(cs.state(), State::Off);
        assert_eq!(cs.outputs(), Outputs::IDLE);
        assert_eq!(cs.cycles(), 0);
    }

    #[test]
    fn test_startup_sequence() {
        let mut cs = ControllerState::new();
        cs.start();
        assert_eq!(cs.state(), State::Init);

        advance(&mut cs, false, false, false);
        assert_eq!(cs.state(), State::Waiting);

        advance(&mut cs, true, false, false);
        assert_eq!(cs.state(), State::RelayLocal);
        assert!(cs.outputs().tx_local && cs.outputs().tx_remote);
        assert_eq!(cs.cycles(), 2);
    }

    #[test]
    fn test_shutdown_from_relay_remote() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, false, true, false);
        advance(&mut cs, false, true, false);
        assert_eq!(cs.state(), State::RelayRemote);

        cs.request_shutdown();
        assert_eq!(cs.state(), State::Deinit);

        advance(&mut cs, false, true, false);
        assert_eq!(cs.state(), State::Off);
        assert_eq!(cs.outputs(), Outputs::IDLE);

        // Already off, nothing to unwind
        cs.request_shutdown();
        assert_eq!(cs.state(), State::Off);
    }

    #[test]
    fn test_beacon_playing_latch_carried() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, false, false, true);
        assert_eq!(cs.state(), State::Waiting);
        advance(&mut cs, false, false, true);
        assert_eq!(cs.state(), State::Beacon);
        assert!(!cs.beacon_playing());

        let d = advance(&mut cs, false, false, true);
        assert!(d.side_effect.is_some());
        assert!(cs.beacon_playing());

        let d = advance(&mut cs, false, false, true);
        assert!(d.side_effect.is_none());

        advance(&mut cs, false, false, false);
        assert_eq!(cs.state(), State::Waiting);
        assert!(!cs.beacon_playing());
    }

    #[test]
    fn test_report_serializes() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, true, false, false);
        let json = serde_json::to_string(&cs.report()).unwrap();
        assert!(json.contains("\"state\":\"waiting\""));
        assert!(json.contains("\"rx_local\":true"));
    }

    #[test]
    fn test_decide_commits_nothing() {
        let mut cs = ControllerState::new();
        cs.start();
        let d = cs.decide(true, false, false);
        assert_eq!(d.next, State::Waiting);
        assert_eq!(cs.state(), State::Init);
        assert_eq!(cs.cycles(), 1);
    }

    #[test]
    fn test_failed_playback_cycle_is_not_latched() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, false, false, true);
        advance(&mut cs, false, false, true);
        assert_eq!(cs.state(), State::Beacon);

        let d = cs.decide(false, false, true);
        assert_eq!(d.side_effect, Some(SideEffect::PlayBeacon));
        cs.commit_released(d);
        assert_eq!(cs.state(), State::Beacon);
        assert!(!cs.beacon_playing());
        assert_eq!(cs.outputs(), Outputs::IDLE);

        // Playback is requested again on the next cycle
        let d = advance(&mut cs, false, false, true);
        assert_eq!(d.side_effect, Some(SideEffect::PlayBeacon));
        assert!(cs.beacon_playing());
        assert!(cs.outputs().tx_local);
    }

    #[test]
    fn test_failure_while_playing_keeps_latch() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, false, false, true);
        advance(&mut cs, false, false, true);
        advance(&mut cs, false, false, true);
        assert!(cs.beacon_playing());

        let d = cs.decide(false, false, true);
        cs.commit_released(d);
        assert!(cs.beacon_playing());
        assert_eq!(cs.outputs(), Outputs::IDLE);
    }

    #[test]
    fn test_failed_shutdown_cycle_still_stops() {
        let mut cs = ControllerState::new();
        cs.start();
        advance(&mut cs, true, false, false);
        advance(&mut cs, true, false, false);
        cs.request_shutdown();

        let d = cs.decide(true, false, false);
        cs.commit_released(d);
        assert_eq!(cs.state(), State::Off);
    }
}
