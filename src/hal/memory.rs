//! In-memory GPIO backend
//!
//! Cloneable handle over shared levels. Used for `REPEATER_HAL=sim` dry
//! runs and as the test double for the cycle driver. The level and fault
//! setters only exist in test builds.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{Gpio, HalError, InputPin, OutputPin};

#[derive(Debug, Default)]
struct Lines {
    rx_local: bool,
    rx_remote: bool,
    tx_local: bool,
    tx_remote: bool,
    failed_inputs: HashSet<InputPin>,
    failed_outputs: HashSet<OutputPin>,
}

/// Shared in-memory line levels
#[derive(Debug, Clone, Default)]
pub struct MemoryGpio {
    lines: Arc<Mutex<Lines>>,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(&self) -> MutexGuard<'_, Lines> {
        // A panic while holding the lock cannot leave the levels inconsistent
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set an input level, as the receiver would
    #[cfg(test)]
    pub fn set_input(&self, pin: InputPin, active: bool) {
        let mut lines = self.lines();
        match pin {
            InputPin::RxLocal => lines.rx_local = active,
            InputPin::RxRemote => lines.rx_remote = active,
        }
    }

    /// Current output level
    #[cfg(test)]
    pub fn output(&self, pin: OutputPin) -> bool {
        let lines = self.lines();
        match pin {
            OutputPin::TxLocal => lines.tx_local,
            OutputPin::TxRemote => lines.tx_remote,
        }
    }

    /// Make reads of `pin` fail until cleared
    #[cfg(test)]
    pub fn fail_input(&self, pin: InputPin, failed: bool) {
        let mut lines = self.lines();
        if failed {
            lines.failed_inputs.insert(pin);
        } else {
            lines.failed_inputs.remove(&pin);
        }
    }

    /// Make writes to `pin` fail until cleared
    #[cfg(test)]
    pub fn fail_output(&self, pin: OutputPin, failed: bool) {
        let mut lines = self.lines();
        if failed {
            lines.failed_outputs.insert(pin);
        } else {
            lines.failed_outputs.remove(&pin);
        }
    }
}

impl Gpio for MemoryGpio {
    fn read_input(&self, pin: InputPin) -> Result<bool, HalError> {
        let lines = self.lines();
        if lines.failed_inputs.contains(&pin) {
            return Err(HalError::Injected(format!("{pin:?}")));
        }
        Ok(match pin {
            InputPin::RxLocal => lines.rx_local,
            InputPin::RxRemote => lines.rx_remote,
        })
    }

    fn write_output(&self, pin: OutputPin, active: bool) -> Result<(), HalError> {
        let mut lines = self.lines();
        if lines.failed_outputs.contains(&pin) {
            return Err(HalError::Injected(format!("{pin:?}")));
        }
        let line = match pin {
            OutputPin::TxLocal => &mut lines.tx_local,
            OutputPin::TxRemote => &mut lines.tx_remote,
        };
        if *line != active {
            debug!(?pin, active, "simulated output changed");
        }
        *line = active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_shared_between_clones() {
        let gpio = MemoryGpio::new();
        let handle = gpio.clone();

        handle.set_input(InputPin::RxRemote, true);
        assert!(gpio.read_input(InputPin::RxRemote).unwrap());
        assert!(!gpio.read_input(InputPin::RxLocal).unwrap());

        gpio.write_output(OutputPin::TxLocal, true).unwrap();
        assert!(handle.output(OutputPin::TxLocal));
    }

    #[test]
    fn test_release_all_continues_past_failure() {
        let gpio = MemoryGpio::new();
        gpio.write_output(OutputPin::TxLocal, true).unwrap();
        gpio.write_output(OutputPin::TxRemote, true).unwrap();
        gpio.fail_output(OutputPin::TxLocal, true);

        assert!(gpio.release_all().is_err());
        assert!(gpio.output(OutputPin::TxLocal));
        assert!(!gpio.output(OutputPin::TxRemote));
    }

    #[test]
    fn test_injected_read_failure() {
        let gpio = MemoryGpio::new();
        gpio.fail_input(InputPin::RxLocal, true);
        assert!(matches!(
            gpio.read_input(InputPin::RxLocal),
            Err(HalError::Injected(_))
        ));
        gpio.fail_input(InputPin::RxLocal, false);
        assert!(gpio.read_input(InputPin::RxLocal).is_ok());
    }
}
