//! Linux sysfs GPIO backend
//!
//! Exports the four lines under `/sys/class/gpio`, configures direction and
//! reads/writes `value`. Active-low wiring is inverted here rather than via
//! the kernel `active_low` attribute, because writing `low`/`high` to
//! `direction` sets the raw level.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Gpio, HalError, InputPin, OutputPin};

/// Line numbers for the four signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMap {
    pub rx_local: u32,
    pub rx_remote: u32,
    pub tx_local: u32,
    pub tx_remote: u32,
}

impl LineMap {
    fn input(&self, pin: InputPin) -> u32 {
        match pin {
            InputPin::RxLocal => self.rx_local,
            InputPin::RxRemote => self.rx_remote,
        }
    }

    fn output(&self, pin: OutputPin) -> u32 {
        match pin {
            OutputPin::TxLocal => self.tx_local,
            OutputPin::TxRemote => self.tx_remote,
        }
    }
}

/// GPIO lines driven through sysfs
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    lines: LineMap,
    active_low: bool,
}

impl SysfsGpio {
    /// Export and configure all lines. Outputs start inactive.
    pub fn open(root: impl Into<PathBuf>, lines: LineMap, active_low: bool) -> Result<Self, HalError> {
        let gpio = Self {
            root: root.into(),
            lines,
            active_low,
        };

        for pin in InputPin::ALL {
            let line = lines.input(pin);
            gpio.export(line)?;
            gpio.set_direction(line, "in")?;
        }
        // Raw level that means "not keyed"
        let inactive = if active_low { "high" } else { "low" };
        for pin in OutputPin::ALL {
            let line = lines.output(pin);
            gpio.export(line)?;
            gpio.set_direction(line, inactive)?;
        }

        info!(root = %gpio.root.display(), ?lines, active_low, "gpio lines configured");
        Ok(gpio)
    }

    fn line_dir(&self, line: u32) -> PathBuf {
        self.root.join(format!("gpio{line}"))
    }

    fn value_path(&self, line: u32) -> PathBuf {
        self.line_dir(line).join("value")
    }

    fn export(&self, line: u32) -> Result<(), HalError> {
        if self.line_dir(line).exists() {
            debug!(line, "gpio already exported");
            return Ok(());
        }
        fs::write(self.root.join("export"), line.to_string())
            .map_err(|source| HalError::Export { line, source })?;

        // udev may still be adjusting permissions on the new node
        for _ in 0..20 {
            if self.line_dir(line).join("direction").exists() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }

    fn set_direction(&self, line: u32, direction: &str) -> Result<(), HalError> {
        fs::write(self.line_dir(line).join("direction"), direction)
            .map_err(|source| HalError::Configure { line, source })
    }

    fn read_line(&self, line: u32) -> Result<bool, HalError> {
        let path = self.value_path(line);
        let raw = fs::read_to_string(&path).map_err(|source| HalError::Read {
            path: path.clone(),
            source,
        })?;
        let level = parse_level(&path, &raw)?;
        Ok(level != self.active_low)
    }

    fn write_line(&self, line: u32, active: bool) -> Result<(), HalError> {
        let path = self.value_path(line);
        let raw = if active != self.active_low { "1" } else { "0" };
        fs::write(&path, raw).map_err(|source| HalError::Write { path, source })
    }
}

fn parse_level(path: &Path, raw: &str) -> Result<bool, HalError> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(HalError::InvalidLevel {
            path: path.to_path_buf(),
            value: other.to_string(),
        }),
    }
}

impl Gpio for SysfsGpio {
    fn read_input(&self, pin: InputPin) -> Result<bool, HalError> {
        self.read_line(self.lines.input(pin))
    }

    fn write_output(&self, pin: OutputPin, active: bool) -> Result<(), HalError> {
        self.write_line(self.lines.output(pin), active)
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        match self.release_all() {
            Ok(()) => debug!("gpio outputs released"),
            Err(e) => warn!(?e, "failed to release gpio outputs"),
        }
    }
}
