//! Configuration management for the rpifand daemon.
//!
//! Handles locating, parsing and validating the YAML policy file, and turns
//! it into the immutable [`Policy`] and [`DaemonSettings`] the control loop
//! runs with.

use crate::{
    policy::{Level, Policy, Tier},
    sensors::MilliCelsius,
    temperature_sensors::thermal_zone::DEFAULT_THERMAL_ZONE,
};
use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Well-known location of the policy file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rpifand/rpifand.yml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "RPIFAND_CONFIG";

/// Number of breakpoints a tiered policy must define.
pub const TIER_COUNT: usize = 6;

/// Main configuration structure, deserialized from the YAML policy file.
///
/// # Example
///
/// ```yaml
/// version: 1
/// main:
///   mode: tiered
///   thermal_interval_seconds: 5
///   tail_range: 6
/// binary:
///   temp_threshold_celsius: 60
/// tiered:
///   levels:
///     - { temp_celsius: 0, speed: 10 }
///     - { temp_celsius: 30, speed: 25 }
///     - { temp_celsius: 45, speed: 40 }
///     - { temp_celsius: 60, speed: 60 }
///     - { temp_celsius: 75, speed: 80 }
///     - { temp_celsius: 90, speed: 100 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Mode selection and loop timing.
    pub main: MainCfg,

    /// Temperature source.
    #[serde(default)]
    pub sensor: SensorCfg,

    /// Output pin selection.
    #[serde(default)]
    pub actuator: ActuatorCfg,

    /// Parameters of the on/off policy. Required when `main.mode` is binary.
    #[serde(default)]
    pub binary: Option<BinaryCfg>,

    /// Parameters of the stepped PWM policy. Required when `main.mode` is tiered.
    #[serde(default)]
    pub tiered: Option<TieredCfg>,
}

/// Operating mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Relay-style on/off output.
    #[serde(alias = "onoff", alias = "ONOFF")]
    Binary,
    /// Variable duty-cycle output.
    #[serde(alias = "pwm", alias = "PWM")]
    Tiered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainCfg {
    pub mode: Mode,

    /// Sampling interval in seconds.
    #[serde(default = "defaults::interval_seconds")]
    pub thermal_interval_seconds: u64,

    /// Length of the smoothing window, in samples.
    #[serde(default = "defaults::tail_range")]
    pub tail_range: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorCfg {
    /// File holding the temperature in milli-degrees Celsius.
    #[serde(default = "defaults::sensor_path")]
    pub path: PathBuf,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            path: defaults::sensor_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorCfg {
    /// GPIO line number of the fan output.
    #[serde(default = "defaults::gpio_pin")]
    pub gpio_pin: u32,

    /// PWM chip index used in tiered mode.
    #[serde(default)]
    pub pwm_chip: u32,

    /// PWM channel on `pwm_chip` used in tiered mode.
    #[serde(default)]
    pub pwm_channel: u32,

    /// Root of the sysfs class hierarchy.
    #[serde(default = "defaults::sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            gpio_pin: defaults::gpio_pin(),
            pwm_chip: 0,
            pwm_channel: 0,
            sysfs_root: defaults::sysfs_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryCfg {
    /// Representative temperature at or above which the output is on.
    pub temp_threshold_celsius: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredCfg {
    /// PWM carrier frequency.
    #[serde(default = "defaults::pwm_frequency_hz")]
    pub frequency_hz: u32,

    /// Breakpoints in ascending temperature order.
    pub levels: Vec<TierCfg>,
}

/// One temperature breakpoint and the duty cycle selected from it upwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierCfg {
    pub temp_celsius: i64,
    /// Duty cycle in percent (0-100).
    pub speed: u8,
}

/// Loop timing and hardware selection resolved from a [`Config`].
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub interval: Duration,
    pub tail_range: usize,
    pub sensor_path: PathBuf,
    pub actuator: ActuatorCfg,
}

mod defaults {
    use std::path::PathBuf;

    pub fn interval_seconds() -> u64 {
        5
    }

    pub fn tail_range() -> usize {
        6
    }

    pub fn sensor_path() -> PathBuf {
        PathBuf::from(super::DEFAULT_THERMAL_ZONE)
    }

    pub fn gpio_pin() -> u32 {
        18
    }

    pub fn sysfs_root() -> PathBuf {
        PathBuf::from("/sys/class")
    }

    pub fn pwm_frequency_hz() -> u32 {
        38_000 * 4
    }
}

impl Config {
    /// Loads and validates the configuration.
    ///
    /// Uses `path` when given, otherwise `$RPIFAND_CONFIG`, otherwise
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(locate_config);

        info!("Loading config from: {}", config_path.display());
        Self::load_from_path(&config_path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration in: {}", path.display()))?;

        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        if config.version != 1 {
            bail!("Unsupported config version {}", config.version);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.main.thermal_interval_seconds == 0 {
            bail!("thermal_interval_seconds must be at least 1");
        }

        if self.main.tail_range == 0 {
            warn!("tail_range is 0: every decision will use a neutral 0°C reading");
        }

        match self.main.mode {
            Mode::Binary => {
                let binary = self
                    .binary
                    .as_ref()
                    .context("Mode 'binary' requires a 'binary' section")?;
                to_millis(binary.temp_threshold_celsius)?;
            }
            Mode::Tiered => {
                let tiered = self
                    .tiered
                    .as_ref()
                    .context("Mode 'tiered' requires a 'tiered' section")?;
                tiered.validate()?;
            }
        }

        Ok(())
    }

    /// Builds the actuation policy for the selected mode.
    pub fn policy(&self) -> Result<Policy> {
        match self.main.mode {
            Mode::Binary => {
                let binary = self
                    .binary
                    .as_ref()
                    .context("Mode 'binary' requires a 'binary' section")?;
                Ok(Policy::Binary {
                    threshold: to_millis(binary.temp_threshold_celsius)?,
                })
            }
            Mode::Tiered => {
                let tiered = self
                    .tiered
                    .as_ref()
                    .context("Mode 'tiered' requires a 'tiered' section")?;
                tiered.validate()?;
                let tiers = tiered
                    .levels
                    .iter()
                    .map(|tier| -> Result<Tier> {
                        let level = Level::new(tier.speed)
                            .with_context(|| format!("Speed {} is above 100", tier.speed))?;
                        Ok(Tier::new(to_millis(tier.temp_celsius)?, level))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Policy::Tiered {
                    tiers,
                    frequency_hz: tiered.frequency_hz,
                })
            }
        }
    }

    pub fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            interval: Duration::from_secs(self.main.thermal_interval_seconds),
            tail_range: self.main.tail_range,
            sensor_path: self.sensor.path.clone(),
            actuator: self.actuator.clone(),
        }
    }
}

impl TieredCfg {
    /// Checks tier count, ordering and speed range.
    pub fn validate(&self) -> Result<()> {
        if self.frequency_hz == 0 {
            bail!("frequency_hz must be positive");
        }

        if self.levels.len() != TIER_COUNT {
            bail!(
                "Tiered mode needs exactly {TIER_COUNT} levels, found {}",
                self.levels.len()
            );
        }

        for tier in &self.levels {
            to_millis(tier.temp_celsius)?;
        }

        if let Some(tier) = self.levels.iter().find(|tier| tier.speed > 100) {
            bail!(
                "Speed {} at {}°C is above 100",
                tier.speed,
                tier.temp_celsius
            );
        }

        for pair in self.levels.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if lo.temp_celsius >= hi.temp_celsius {
                bail!(
                    "Tier temperatures must be strictly increasing: {}°C is followed by {}°C",
                    lo.temp_celsius,
                    hi.temp_celsius
                );
            }
            if lo.speed > hi.speed {
                bail!(
                    "Tier speeds must not decrease: {}% at {}°C is followed by {}% at {}°C",
                    lo.speed,
                    lo.temp_celsius,
                    hi.speed,
                    hi.temp_celsius
                );
            }
        }

        Ok(())
    }
}

fn to_millis(celsius: i64) -> Result<MilliCelsius> {
    MilliCelsius::checked_from_celsius(celsius)
        .with_context(|| format!("Temperature {celsius}°C is out of range"))
}

fn locate_config() -> PathBuf {
    env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
