//! Hardware abstraction for the receiver and transmitter lines
//!
//! Two inputs (carrier detect) and two outputs (PTT). Backends:
//! - `SysfsGpio`: Linux `/sys/class/gpio`
//! - `MemoryGpio`: in-memory levels for dry runs and tests

mod memory;
mod sysfs;
mod watcher;

use std::path::PathBuf;

pub use memory::MemoryGpio;
pub use sysfs::{LineMap, SysfsGpio};
pub use watcher::EdgeWatcher;

/// Receiver carrier-detect lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputPin {
    /// input 0
    RxLocal,
    /// input 1
    RxRemote,
}

impl InputPin {
    pub const ALL: [InputPin; 2] = [InputPin::RxLocal, InputPin::RxRemote];
}

/// Transmitter keying lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPin {
    /// output 0
    TxLocal,
    /// output 1
    TxRemote,
}

impl OutputPin {
    pub const ALL: [OutputPin; 2] = [OutputPin::TxLocal, OutputPin::TxRemote];
}

/// Digital line access
///
/// `true` is the active level: carrier present on inputs, transmitter
/// keyed on outputs. Implementations must never block for long.
pub trait Gpio: Send + Sync {
    fn read_input(&self, pin: InputPin) -> Result<bool, HalError>;

    fn write_output(&self, pin: OutputPin, active: bool) -> Result<(), HalError>;

    /// Drive every output inactive, attempting all of them even if one fails
    fn release_all(&self) -> Result<(), HalError> {
        let mut first_err = None;
        for pin in OutputPin::ALL {
            if let Err(e) = self.write_output(pin, false) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Errors from the GPIO backends
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("failed to export gpio {line}: {source}")]
    Export {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure gpio {line}: {source}")]
    Configure {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected level {value:?} in {}", path.display())]
    InvalidLevel { path: PathBuf, value: String },

    #[error("simulated fault on {0}")]
    Injected(String),
}

impl<G: Gpio + ?Sized> Gpio for std::sync::Arc<G> {
    fn read_input(&self, pin: InputPin) -> Result<bool, HalError> {
        (**self).read_input(pin)
    }

    fn write_output(&self, pin: OutputPin, active: bool) -> Result<(), HalError> {
        (**self).write_output(pin, active)
    }
}
