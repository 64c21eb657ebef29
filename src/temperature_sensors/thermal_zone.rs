use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::sensors::{MilliCelsius, TemperatureSensor};

/// Default kernel thermal zone of the SoC.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Reads a whole-number milli-degree value from a sysfs thermal zone file.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ThermalZoneSensor {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

#[async_trait]
impl TemperatureSensor for ThermalZoneSensor {
    async fn read_temperature(&self) -> Result<MilliCelsius> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        raw.trim()
            .parse::<i64>()
            .map(MilliCelsius)
            .with_context(|| format!("Not an integer temperature: {:?}", raw.trim()))
    }

    fn sensor_name(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn zone_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reads_value_with_trailing_newline() {
        let file = zone_file("48312\n");
        let sensor = ThermalZoneSensor::new(file.path());

        assert_eq!(sensor.read_temperature().await.unwrap(), MilliCelsius(48_312));
    }

    #[tokio::test]
    async fn reads_negative_value() {
        let file = zone_file("-2000\n");
        let sensor = ThermalZoneSensor::new(file.path());

        assert_eq!(sensor.read_temperature().await.unwrap(), MilliCelsius(-2_000));
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let file = zone_file("hot\n");
        let sensor = ThermalZoneSensor::new(file.path());

        let err = sensor.read_temperature().await.unwrap_err();
        assert!(err.to_string().contains("Not an integer temperature"));
    }

    #[test]
    fn empty_file_is_a_parse_error() {
        let file = zone_file("");
        let sensor = ThermalZoneSensor::new(file.path());

        tokio_test::assert_err!(tokio_test::block_on(sensor.read_temperature()));
    }

    #[test]
    fn rereads_after_file_changes() {
        let file = zone_file("41000\n");
        let sensor = ThermalZoneSensor::new(file.path());
        let first = tokio_test::assert_ok!(tokio_test::block_on(sensor.read_temperature()));

        std::fs::write(file.path(), "52500\n").unwrap();
        let second = tokio_test::assert_ok!(tokio_test::block_on(sensor.read_temperature()));

        assert_eq!((first, second), (MilliCelsius(41_000), MilliCelsius(52_500)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = ThermalZoneSensor::new(dir.path().join("temp"));

        let err = sensor.read_temperature().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn default_points_at_first_thermal_zone() {
        let sensor = ThermalZoneSensor::default();
        assert_eq!(sensor.path(), Path::new(DEFAULT_THERMAL_ZONE));
        assert_eq!(sensor.sensor_name(), DEFAULT_THERMAL_ZONE);
    }
}
