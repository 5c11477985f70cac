//! Carrier-operated relay transition function
//!
//! Pure decision logic: given the current state and the sampled signal
//! levels, compute the next state, the transmitter keying and whether the
//! beacon audio must be started. No I/O happens here.

use serde::{Deserialize, Serialize};

/// The states of the repeater controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Controller stopped, transmitters released
    Off,
    /// Startup, first cycle after the pins are provisioned
    Init,
    /// Idle, no carrier on either receiver
    Waiting,
    /// Local receiver active, retransmitted on both legs
    RelayLocal,
    /// Remote receiver active, retransmitted locally
    RelayRemote,
    /// Identification beacon pending or playing
    Beacon,
    /// Shutdown requested, releasing transmitters
    Deinit,
}

impl Default for State {
    fn default() -> Self {
        Self::Off
    }
}

impl State {
    /// Human-readable label, used for diagnostics only
    pub fn label(&self) -> &'static str {
        match self {
            State::Off => "Off",
            State::Init => "Initialization",
            State::Waiting => "Waiting",
            State::RelayLocal => "Relaying local signal",
            State::RelayRemote => "Relaying remote signal",
            State::Beacon => "Sending beacon",
            State::Deinit => "Deinitialization",
        }
    }

    /// Whether the control loop keeps running in this state
    pub fn is_running(&self) -> bool {
        !matches!(self, State::Off)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Levels sampled (or derived) at the start of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Inputs {
    /// Carrier detected on the local receiver
    pub rx_local: bool,
    /// Carrier detected on the remote receiver
    pub rx_remote: bool,
    /// A scheduled beacon is pending or its window is still open
    pub beacon_time: bool,
    /// Beacon audio already started in the current window
    pub beacon_playing: bool,
}

impl Inputs {
    /// Neither receiver has a carrier
    pub fn rx_clear(&self) -> bool {
        !self.rx_local && !self.rx_remote
    }
}

/// Transmitter keying
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Outputs {
    pub tx_local: bool,
    pub tx_remote: bool,
}

impl Outputs {
    /// Both transmitters released
    pub const IDLE: Outputs = Outputs {
        tx_local: false,
        tx_remote: false,
    };
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Start the beacon audio, fire-and-forget
    PlayBeacon,
}

/// Result of one evaluation of the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub next: State,
    pub outputs: Outputs,
    pub beacon_playing: bool,
    pub side_effect: Option<SideEffect>,
}

impl Decision {
    fn settle(next: State, beacon_playing: bool) -> Self {
        Self {
            next,
            outputs: keying(next, beacon_playing),
            beacon_playing,
            side_effect: None,
        }
    }
}

/// Transmitter keying for a state.
///
/// `RelayLocal` keys both legs, `RelayRemote` only the local one. In
/// `Beacon` the local transmitter is keyed only while the audio plays.
pub fn keying(state: State, beacon_playing: bool) -> Outputs {
    match state {
        State::RelayLocal => Outputs {
            tx_local: true,
            tx_remote: true,
        },
        State::RelayRemote => Outputs {
            tx_local: true,
            tx_remote: false,
        },
        State::Beacon => Outputs {
            tx_local: beacon_playing,
            tx_remote: false,
        },
        State::Off | State::Init | State::Waiting | State::Deinit => Outputs::IDLE,
    }
}

/// Compute the next state from the current one and the sampled inputs.
///
/// Rows are evaluated top to bottom per state; the function is total and
/// only consumes levels, so a duplicated edge event is harmless.
pub fn step(state: State, inputs: Inputs) -> Decision {
    match state {
        State::Off => Decision::settle(State::Off, false),

        State::Init => Decision::settle(State::Waiting, false),

        State::Waiting => {
            if inputs.beacon_time {
                Decision::settle(State::Beacon, false)
            } else if inputs.rx_local && !inputs.rx_remote {
                Decision::settle(State::RelayLocal, false)
            } else if !inputs.rx_local && inputs.rx_remote {
                Decision::settle(State::RelayRemote, false)
            } else {
                Decision::settle(State::Waiting, false)
            }
        }

        State::RelayLocal | State::RelayRemote => {
            if inputs.rx_clear() {
                // A beacon deferred by the QSO goes out as soon as it ends
                let next = if inputs.beacon_time {
                    State::Beacon
                } else {
                    State::Waiting
                };
                Decision::settle(next, false)
            } else {
                Decision::settle(state, false)
            }
        }

        State::Beacon => {
            if !inputs.beacon_time {
                Decision::settle(State::Waiting, false)
            } else if !inputs.beacon_playing && inputs.rx_clear() {
                Decision {
                    side_effect: Some(SideEffect::PlayBeacon),
                    ..Decision::settle(State::Beacon, true)
                }
            } else {
                Decision::settle(State::Beacon, inputs.beacon_playing)
            }
        }

        State::Deinit => Decision::settle(State::Off, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [State; 7] = [
        State::Off,
        State::Init,
        State::Waiting,
        State::RelayLocal,
        State::RelayRemote,
        State::Beacon,
        State::Deinit,
    ];

    fn inputs(rx_local: bool, rx_remote: bool, beacon_time: bool, beacon_playing: bool) -> Inputs {
        Inputs {
            rx_local,
            rx_remote,
            beacon_time,
            beacon_playing,
        }
    }

    fn all_inputs() -> impl Iterator<Item = Inputs> {
        (0u8..16).map(|bits| {
            inputs(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0)
        })
    }

    #[test]
    fn test_waiting_to_relay_local() {
        let d = step(State::Waiting, inputs(true, false, false, false));
        assert_eq!(d.next, State::RelayLocal);
        assert!(d.outputs.tx_local);
        assert!(d.outputs.tx_remote);
        assert_eq!(d.side_effect, None);
    }

    #[test]
    fn test_relay_local_to_waiting() {
        let d = step(State::RelayLocal, inputs(false, false, false, false));
        assert_eq!(d.next, State::Waiting);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_waiting_to_beacon_without_keying() {
        let d = step(State::Waiting, inputs(false, false, true, false));
        assert_eq!(d.next, State::Beacon);
        assert_eq!(d.outputs, Outputs::IDLE);
        assert_eq!(d.side_effect, None);

        // Beacon takes priority over an active receiver
        let d = step(State::Waiting, inputs(true, false, true, false));
        assert_eq!(d.next, State::Beacon);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_beacon_starts_playback_once() {
        let d = step(State::Beacon, inputs(false, false, true, false));
        assert_eq!(d.next, State::Beacon);
        assert!(d.beacon_playing);
        assert!(d.outputs.tx_local);
        assert!(!d.outputs.tx_remote);
        assert_eq!(d.side_effect, Some(SideEffect::PlayBeacon));

        let again = step(State::Beacon, inputs(false, false, true, d.beacon_playing));
        assert_eq!(again.next, State::Beacon);
        assert!(again.beacon_playing);
        assert!(again.outputs.tx_local);
        assert_eq!(again.side_effect, None);
    }

    #[test]
    fn test_beacon_waits_for_clear_receivers() {
        let d = step(State::Beacon, inputs(true, false, true, false));
        assert_eq!(d.next, State::Beacon);
        assert!(!d.beacon_playing);
        assert_eq!(d.outputs, Outputs::IDLE);
        assert_eq!(d.side_effect, None);
    }

    #[test]
    fn test_beacon_window_closed() {
        let d = step(State::Beacon, inputs(false, false, false, true));
        assert_eq!(d.next, State::Waiting);
        assert!(!d.beacon_playing);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_relay_remote_keys_local_only() {
        let d = step(State::Waiting, inputs(false, true, false, false));
        assert_eq!(d.next, State::RelayRemote);
        assert!(d.outputs.tx_local);
        assert!(!d.outputs.tx_remote);

        let d = step(State::RelayRemote, inputs(true, false, false, false));
        assert_eq!(d.next, State::RelayRemote);

        let d = step(State::RelayRemote, inputs(false, false, false, false));
        assert_eq!(d.next, State::Waiting);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_both_receivers_active_while_waiting() {
        let d = step(State::Waiting, inputs(true, true, false, false));
        assert_eq!(d.next, State::Waiting);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_relay_holds_through_pending_beacon() {
        let d = step(State::RelayLocal, inputs(true, false, true, false));
        assert_eq!(d.next, State::RelayLocal);

        let d = step(State::RelayLocal, inputs(false, false, true, false));
        assert_eq!(d.next, State::Beacon);
        assert_eq!(d.outputs, Outputs::IDLE);
    }

    #[test]
    fn test_lifecycle_states() {
        assert_eq!(step(State::Init, Inputs::default()).next, State::Waiting);
        assert_eq!(step(State::Deinit, inputs(true, true, true, true)).next, State::Off);
        assert_eq!(step(State::Off, inputs(true, true, true, true)).next, State::Off);
        assert!(!State::Off.is_running());
        assert!(State::Deinit.is_running());
    }

    #[test]
    fn test_step_is_total_and_deterministic() {
        for state in ALL_STATES {
            for input in all_inputs() {
                let a = step(state, input);
                let b = step(state, input);
                assert_eq!(a, b, "{state:?} {input:?}");
                assert_eq!(a.outputs, keying(a.next, a.beacon_playing));
            }
        }
    }

    #[test]
    fn test_transmitters_release_when_idle() {
        // No state may stay keyed with both receivers clear and no beacon
        for state in ALL_STATES {
            let idle = inputs(false, false, false, false);
            let first = step(state, idle);
            let second = step(first.next, idle);
            assert_eq!(second.outputs, Outputs::IDLE, "from {state:?}");
        }
    }

    fn settle(mut state: State, input: Inputs, steps: usize) -> Decision {
        let mut playing = input.beacon_playing;
        let mut last = step(state, input);
        for _ in 0..steps {
            last = step(
                state,
                Inputs {
                    beacon_playing: playing,
                    ..input
                },
            );
            state = last.next;
            playing = last.beacon_playing;
        }
        last
    }

    #[test]
    fn test_repeated_inputs_are_idempotent() {
        // Init -> Waiting -> Beacon -> Beacon(playing) is the longest chain
        for state in ALL_STATES {
            for input in all_inputs() {
                let settled = settle(state, input, 3);
                let again = step(
                    settled.next,
                    Inputs {
                        beacon_playing: settled.beacon_playing,
                        ..input
                    },
                );
                assert_eq!(settled.next, again.next, "{state:?} {input:?}");
                assert_eq!(settled.outputs, again.outputs, "{state:?} {input:?}");
                assert_eq!(again.side_effect, None, "{state:?} {input:?}");
            }
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(State::RelayLocal.to_string(), "Relaying local signal");
        assert_eq!(State::default(), State::Off);
        let json = serde_json::to_string(&State::RelayRemote).unwrap();
        assert_eq!(json, "\"relay_remote\"");
    }
}
