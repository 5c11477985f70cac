//! Events module for waking the control loop
//!
//! Every producer (edge watcher, beacon clock, shutdown handler) pushes
//! into one unbounded FIFO queue. Events only wake the cycle driver; the
//! authoritative levels are re-sampled on each cycle.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::hal::InputPin;

/// Producer side of the control queue
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Consumer side of the control queue
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create the control queue
pub fn queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Events delivered to the cycle driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Local receiver carrier appeared
    RxLocalOpen,

    /// Local receiver carrier dropped
    RxLocalClose,

    /// Remote receiver carrier appeared
    RxRemoteOpen,

    /// Remote receiver carrier dropped
    RxRemoteClose,

    /// Beacon schedule boundary reached
    BeaconTime,

    /// Beacon window has run its course
    BeaconElapsed,

    /// Termination requested by the process boundary
    Shutdown,
}

impl Event {
    /// Map an input edge to its event
    pub fn from_edge(pin: InputPin, active: bool) -> Self {
        match (pin, active) {
            (InputPin::RxLocal, true) => Event::RxLocalOpen,
            (InputPin::RxLocal, false) => Event::RxLocalClose,
            (InputPin::RxRemote, true) => Event::RxRemoteOpen,
            (InputPin::RxRemote, false) => Event::RxRemoteClose,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::RxLocalOpen => write!(f, "RX_LOCAL_OPEN"),
            Event::RxLocalClose => write!(f, "RX_LOCAL_CLOSE"),
            Event::RxRemoteOpen => write!(f, "RX_REMOTE_OPEN"),
            Event::RxRemoteClose => write!(f, "RX_REMOTE_CLOSE"),
            Event::BeaconTime => write!(f, "BEACON_TIME"),
            Event::BeaconElapsed => write!(f, "BEACON_ELAPSED"),
            Event::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_mapping() {
        assert_eq!(Event::from_edge(InputPin::RxLocal, true), Event::RxLocalOpen);
        assert_eq!(Event::from_edge(InputPin::RxLocal, false), Event::RxLocalClose);
        assert_eq!(Event::from_edge(InputPin::RxRemote, true), Event::RxRemoteOpen);
        assert_eq!(Event::from_edge(InputPin::RxRemote, false), Event::RxRemoteClose);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&Event::BeaconTime).unwrap();
        assert_eq!(json, r#"{"type":"beacon_time"}"#);

        let event: Event = serde_json::from_str(r#"{"type":"rx_remote_close"}"#).unwrap();
        assert_eq!(event, Event::RxRemoteClose);
    }

    #[test]
    fn test_queue_is_fifo() {
        let (tx, mut rx) = queue();
        tx.send(Event::RxLocalOpen).unwrap();
        tx.send(Event::BeaconTime).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Event::RxLocalOpen);
        assert_eq!(rx.try_recv().unwrap(), Event::BeaconTime);
        assert_eq!(Event::Shutdown.to_string(), "SHUTDOWN");
    }
}
