//! Concrete [`TemperatureSensor`](crate::sensors::TemperatureSensor) sources.

pub mod thermal_zone;
