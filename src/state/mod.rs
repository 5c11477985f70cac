//! Controller state machine
//!
//! Provides the repeater FSM with seven states:
//! - Off / Init / Deinit: lifecycle
//! - Waiting: idle, transmitters released
//! - RelayLocal / RelayRemote: carrier relayed between legs
//! - Beacon: periodic identification

mod controller;
mod machine;

pub use controller::ControllerState;
pub use machine::{Outputs, SideEffect, State};
