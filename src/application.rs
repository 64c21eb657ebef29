//! Application entry point and builder pattern implementation.

use std::future::Future;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::sync::mpsc;

use crate::{
    actuator::{Actuator, SharedActuator},
    config::{Config, DaemonSettings},
    controller::Controller,
    drivers::sysfs_pin::SysfsPin,
    policy::Policy,
    sampler::Sampler,
    sensors::TemperatureSensor,
    shutdown::{ShutdownWatcher, TerminationSignals},
    task_manager::TaskManager,
    temperature_sensors::thermal_zone::ThermalZoneSensor,
};

/// Wires the sampler, controller and shutdown watcher together.
///
/// # Example
///
/// ```no_run
/// use rpifand::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    policy: Policy,
    settings: DaemonSettings,
    sensor: Box<dyn TemperatureSensor>,
    actuator: SharedActuator,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Runs the daemon until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let signals = TerminationSignals::install()?;
        self.run_until(signals.recv()).await
    }

    /// Runs the daemon until `shutdown` resolves.
    ///
    /// Returns once the safe state has been attempted and the pipeline tasks
    /// have stopped. A failed safe-state write is logged, not returned.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        let sentinel = self.policy.fail_safe_sentinel();
        let mut controller = Controller::new(
            self.policy,
            self.settings.tail_range,
            self.actuator.clone(),
        );
        controller.start().await?;

        let sampler = Sampler::new(self.sensor, self.settings.interval, sentinel);
        let (tx, rx) = mpsc::channel(1);

        let mut tasks = TaskManager::new();
        tasks.spawn_task("sampler", move |token| sampler.run(tx, token));
        tasks.spawn_task("controller", move |token| controller.run(rx, token));

        let outcome = ShutdownWatcher::new(self.actuator).run_until(shutdown).await;
        tasks.stop_all().await;

        match outcome {
            Ok(cause) => info!("Stopped by {cause}, bye!"),
            Err(e) => error!("Shutdown could not fully engage cooling: {e:#}"),
        }
        Ok(())
    }
}

/// Builder pattern for creating Application instances.
///
/// The sensor and actuator default to the ones described by the
/// configuration.
pub struct ApplicationBuilder {
    config: Option<Config>,
    sensor: Option<Box<dyn TemperatureSensor>>,
    actuator: Option<Box<dyn Actuator>>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: None,
            sensor: None,
            actuator: None,
        }
    }

    /// Sets the validated configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the configured temperature sensor.
    pub fn with_sensor(mut self, sensor: Box<dyn TemperatureSensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Replaces the configured actuator.
    pub fn with_actuator(mut self, actuator: Box<dyn Actuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    /// Resolves the policy and acquires the hardware.
    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow::anyhow!("Configuration is required"))?;
        let policy = config.policy().context("Failed to build policy")?;
        let settings = config.settings();

        let sensor = match self.sensor {
            Some(sensor) => sensor,
            None => Box::new(ThermalZoneSensor::new(&settings.sensor_path)),
        };

        let actuator = match self.actuator {
            Some(actuator) => actuator,
            None => {
                let need_pwm = matches!(policy, Policy::Tiered { .. });
                Box::new(
                    SysfsPin::open(&settings.actuator, need_pwm)
                        .context("Failed to acquire actuator")?,
                )
            }
        };

        Ok(Application {
            policy,
            settings,
            sensor,
            actuator: SharedActuator::new(actuator),
        })
    }
}
