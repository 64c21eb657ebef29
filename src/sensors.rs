use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Temperature in thousandths of a degree Celsius, the unit the kernel
/// thermal zones report in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MilliCelsius(pub i64);

impl MilliCelsius {
    pub const ZERO: Self = Self(0);

    pub const fn from_celsius(celsius: i64) -> Self {
        Self(celsius * 1000)
    }

    /// Returns `None` when the value does not fit in milli-degrees.
    pub const fn checked_from_celsius(celsius: i64) -> Option<Self> {
        match celsius.checked_mul(1000) {
            Some(millis) => Some(Self(millis)),
            None => None,
        }
    }

    pub const fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MilliCelsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}°C", abs / 1000, abs % 1000)
    }
}

#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    async fn read_temperature(&self) -> Result<MilliCelsius>;
    fn sensor_name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_celsius_scales_to_millis() {
        assert_eq!(MilliCelsius::from_celsius(60).millis(), 60_000);
        assert_eq!(MilliCelsius::from_celsius(-5).millis(), -5_000);
    }

    #[test]
    fn checked_from_celsius_rejects_overflow() {
        let limit = i64::MAX / 1000;
        assert_eq!(
            MilliCelsius::checked_from_celsius(limit),
            Some(MilliCelsius(limit * 1000))
        );
        assert_eq!(MilliCelsius::checked_from_celsius(limit + 1), None);
        assert_eq!(MilliCelsius::checked_from_celsius(-limit - 1), None);
    }

    #[test]
    fn display_keeps_three_decimals() {
        assert_eq!(MilliCelsius(61_250).to_string(), "61.250°C");
        assert_eq!(MilliCelsius(7).to_string(), "0.007°C");
        assert_eq!(MilliCelsius(-1_500).to_string(), "-1.500°C");
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(MilliCelsius(45_000) < MilliCelsius(45_001));
        assert_eq!(
            [MilliCelsius(1), MilliCelsius(9), MilliCelsius(3)]
                .into_iter()
                .max(),
            Some(MilliCelsius(9))
        );
    }
}
