//! Actuation policies mapping a representative temperature to a cooling level.
//!
//! Both policies produce a normalised [`Level`] in `0..=100`; the binary
//! policy only ever yields [`Level::OFF`] or [`Level::FULL`].

use std::fmt;

use crate::sensors::MilliCelsius;

/// Sentinel floor used when the configuration is below physical limits.
const SENTINEL_FLOOR: MilliCelsius = MilliCelsius::from_celsius(100);

/// Normalised cooling level, percent of full cooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const OFF: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Returns `None` when `percent` is above 100.
    pub const fn new(percent: u8) -> Option<Self> {
        if percent <= 100 {
            Some(Self(percent))
        } else {
            None
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }

    pub fn is_on(self) -> bool {
        self != Self::OFF
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

/// One breakpoint of a tiered policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Inclusive lower bound of the tier.
    pub lower_bound: MilliCelsius,
    pub level: Level,
}

impl Tier {
    pub fn new(lower_bound: MilliCelsius, level: Level) -> Self {
        Self { lower_bound, level }
    }
}

/// How the actuator output is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Digital,
    Pwm { frequency_hz: u32 },
}

/// Validated actuation policy. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Full cooling at or above `threshold`, none below it.
    Binary { threshold: MilliCelsius },
    /// Stepped duty levels. `tiers` must be non-empty with strictly
    /// increasing bounds; the configuration loader enforces this.
    Tiered { tiers: Vec<Tier>, frequency_hz: u32 },
}

impl Policy {
    /// Maps a representative temperature to a cooling level.
    pub fn evaluate(&self, representative: MilliCelsius) -> Level {
        match self {
            Self::Binary { threshold } => {
                if representative >= *threshold {
                    Level::FULL
                } else {
                    Level::OFF
                }
            }
            Self::Tiered { tiers, .. } => tiers
                .iter()
                .rev()
                .find(|tier| tier.lower_bound <= representative)
                .or_else(|| tiers.first())
                .map_or(Level::FULL, |tier| tier.level),
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        match self {
            Self::Binary { .. } => OutputMode::Digital,
            Self::Tiered { frequency_hz, .. } => OutputMode::Pwm {
                frequency_hz: *frequency_hz,
            },
        }
    }

    /// Highest temperature the policy distinguishes.
    pub fn highest_bound(&self) -> MilliCelsius {
        match self {
            Self::Binary { threshold } => *threshold,
            Self::Tiered { tiers, .. } => tiers
                .iter()
                .map(|tier| tier.lower_bound)
                .max()
                .unwrap_or(MilliCelsius::ZERO),
        }
    }

    /// Synthetic reading published when the sensor cannot be read.
    ///
    /// Always strictly above every configured bound, and never below 100°C.
    pub fn fail_safe_sentinel(&self) -> MilliCelsius {
        let above_config = MilliCelsius(self.highest_bound().millis().saturating_add(1));
        above_config.max(SENTINEL_FLOOR)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Binary { threshold } => format!("binary mode, threshold {threshold}"),
            Self::Tiered { tiers, frequency_hz } => {
                let range = match (tiers.first(), tiers.last()) {
                    (Some(lo), Some(hi)) => format!("{} - {}", lo.lower_bound, hi.lower_bound),
                    _ => "empty".to_string(),
                };
                format!("tiered mode at {frequency_hz} Hz, range {range}")
            }
        }
    }
}
