//! Configuration loading and management
//!
//! There is no configuration file: every setting comes from a
//! `REPEATER_*` environment variable or falls back to its default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::hal::LineMap;

/// Which GPIO backend drives the lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalKind {
    /// Linux sysfs GPIO
    Sysfs,
    /// In-memory lines, nothing is keyed
    Sim,
}

impl FromStr for HalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sysfs" => Ok(HalKind::Sysfs),
            "sim" => Ok(HalKind::Sim),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

/// Errors in the environment configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("gpio line {0} is assigned more than once")]
    DuplicateLine(u32),

    #[error("beacon interval {0} minutes must divide the hour")]
    Interval(u32),
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub hal: HalKind,

    /// sysfs GPIO root
    pub gpio_root: PathBuf,

    pub lines: LineMap,

    /// Lines are active when electrically low
    pub active_low: bool,

    /// Edge watcher sampling period
    pub poll_interval: Duration,

    /// Audio player program
    pub player: String,

    /// Resource handed to the player
    pub beacon_file: String,

    pub beacon_interval_minutes: u32,

    /// Beacon window length once playback started
    pub beacon_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hal: HalKind::Sysfs,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            lines: LineMap {
                rx_local: 17,
                rx_remote: 18,
                tx_local: 27,
                tx_remote: 22,
            },
            active_low: false,
            poll_interval: Duration::from_millis(10),
            player: "mplayer".to_string(),
            beacon_file: "beacon.wav".to_string(),
            beacon_interval_minutes: 10,
            beacon_duration: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            hal: parse_or(get("REPEATER_HAL"), "REPEATER_HAL", defaults.hal)?,
            gpio_root: get("REPEATER_GPIO_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.gpio_root),
            lines: LineMap {
                rx_local: parse_or(get("REPEATER_RX_LOCAL_PIN"), "REPEATER_RX_LOCAL_PIN", defaults.lines.rx_local)?,
                rx_remote: parse_or(get("REPEATER_RX_REMOTE_PIN"), "REPEATER_RX_REMOTE_PIN", defaults.lines.rx_remote)?,
                tx_local: parse_or(get("REPEATER_TX_LOCAL_PIN"), "REPEATER_TX_LOCAL_PIN", defaults.lines.tx_local)?,
                tx_remote: parse_or(get("REPEATER_TX_REMOTE_PIN"), "REPEATER_TX_REMOTE_PIN", defaults.lines.tx_remote)?,
            },
            active_low: parse_or(get("REPEATER_ACTIVE_LOW"), "REPEATER_ACTIVE_LOW", defaults.active_low)?,
            poll_interval: millis_or(get("REPEATER_POLL_MS"), "REPEATER_POLL_MS", defaults.poll_interval)?,
            player: get("REPEATER_PLAYER").unwrap_or(defaults.player),
            beacon_file: get("REPEATER_BEACON_FILE").unwrap_or(defaults.beacon_file),
            beacon_interval_minutes: parse_or(
                get("REPEATER_BEACON_INTERVAL_MIN"),
                "REPEATER_BEACON_INTERVAL_MIN",
                defaults.beacon_interval_minutes,
            )?,
            beacon_duration: secs_or(
                get("REPEATER_BEACON_DURATION_SECS"),
                "REPEATER_BEACON_DURATION_SECS",
                defaults.beacon_duration,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let lines = [
            self.lines.rx_local,
            self.lines.rx_remote,
            self.lines.tx_local,
            self.lines.tx_remote,
        ];
        for (i, line) in lines.iter().enumerate() {
            if lines[i + 1..].contains(line) {
                return Err(ConfigError::DuplicateLine(*line));
            }
        }

        let interval = self.beacon_interval_minutes;
        if interval == 0 || interval > 60 || 60 % interval != 0 {
            return Err(ConfigError::Interval(interval));
        }
        Ok(())
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn positive(raw: Option<String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(value) = raw else {
        return Ok(None);
    };
    match parse_or::<u64>(Some(value.clone()), key, 0)? {
        0 => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        n => Ok(Some(n)),
    }
}

fn millis_or(raw: Option<String>, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(positive(raw, key)?.map_or(default, Duration::from_millis))
}

fn secs_or(raw: Option<String>, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(positive(raw, key)?.map_or(default, Duration::from_secs))
}
