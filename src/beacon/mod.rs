//! Station identification beacon
//!
//! - `schedule`: derives the `beaconTime` signal from wall-clock time
//! - `ticker`: once-per-second boundary detection feeding the event queue
//! - `player`: fire-and-forget audio playback

mod player;
mod schedule;
mod ticker;

pub use player::{CommandPlayer, Player};
pub use schedule::BeaconSchedule;
pub use ticker::{wake_after, BeaconTicker};

#[cfg(test)]
pub use player::RecordingPlayer;
