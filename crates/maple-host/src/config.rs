//! Player bus configuration.

use maple_errors::ConfigError;
use maple_packet::MAX_PLAYERS;
use maple_peripherals::PeripheralTiming;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Overrides the condition report period in microseconds.
pub const ENV_REPORT_PERIOD_US: &str = "MAPLE_REPORT_PERIOD_US";
/// Overrides the identification period in microseconds, 0 identifies once.
pub const ENV_IDENTIFY_PERIOD_US: &str = "MAPLE_IDENTIFY_PERIOD_US";
/// Overrides how many consecutive primary failures trigger a warning.
pub const ENV_FAILURE_WARN_THRESHOLD: &str = "MAPLE_FAILURE_WARN_THRESHOLD";

const DEFAULT_FAILURE_WARN_THRESHOLD: u32 = 3;

/// Settings for one player's bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerBusConfig {
    /// Player slot (0-3) the bus serves
    pub player_index: u8,
    /// Report cadence handed to peripherals built for this bus
    pub timing: PeripheralTiming,
    /// Consecutive failed primary transmissions before a warning is logged
    pub failure_warn_threshold: u32,
}

impl Default for PlayerBusConfig {
    fn default() -> Self {
        Self {
            player_index: 0,
            timing: PeripheralTiming::default(),
            failure_warn_threshold: DEFAULT_FAILURE_WARN_THRESHOLD,
        }
    }
}

impl PlayerBusConfig {
    /// Defaults for `player_index`.
    pub fn for_player(player_index: u8) -> Self {
        Self {
            player_index,
            ..Self::default()
        }
    }

    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value. Unparseable values are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(period) = parse_override::<u64>(&lookup, ENV_REPORT_PERIOD_US, |v| *v > 0) {
            self.timing.report_period_us = period;
        }
        if let Some(period) = parse_override::<u64>(&lookup, ENV_IDENTIFY_PERIOD_US, |_| true) {
            self.timing.identify_period_us = period;
        }
        if let Some(threshold) =
            parse_override::<u32>(&lookup, ENV_FAILURE_WARN_THRESHOLD, |v| *v > 0)
        {
            self.failure_warn_threshold = threshold;
        }
        self
    }

    /// Check the settings before a bus is built from them.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidPlayerIndex`] for a player slot above 3
    /// - [`ConfigError::ZeroPeriod`] for a zero report period
    /// - [`ConfigError::InvalidValue`] for a zero failure threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_index >= MAX_PLAYERS {
            return Err(ConfigError::InvalidPlayerIndex(self.player_index));
        }
        if self.timing.report_period_us == 0 {
            return Err(ConfigError::ZeroPeriod("report_period_us"));
        }
        if self.failure_warn_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "failure_warn_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_override<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    accept: impl Fn(&T) -> bool,
) -> Option<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>().ok().filter(|v| accept(v)) {
        Some(value) => {
            debug!(variable = name, %value, "configuration override applied");
            Some(value)
        }
        None => {
            warn!(variable = name, value = %raw, "ignoring invalid configuration override");
            None
        }
    }
}
