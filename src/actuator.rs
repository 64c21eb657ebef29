//! Actuator abstraction and the shared handle used by the control loop and
//! the shutdown watcher.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::policy::{Level, OutputMode};

/// Logic level of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("OFF"),
            Self::High => f.write_str("ON"),
        }
    }
}

/// Electrical mode of the actuator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Digital,
    Pwm,
}

/// Low-level actuator driver.
///
/// The control loop never reads state back from the hardware; the driver
/// only has to apply what it is told.
#[cfg_attr(test, mockall::automock)]
pub trait Actuator: Send + fmt::Debug {
    fn set_mode(&mut self, mode: PinMode) -> Result<()>;
    fn write_digital(&mut self, level: PinLevel) -> Result<()>;
    fn set_pwm_frequency(&mut self, hz: u32) -> Result<()>;
    fn set_duty_cycle(&mut self, percent: u8) -> Result<()>;

    /// Releases the hardware. Called exactly once, after the final write.
    fn close(&mut self) -> Result<()>;
}

/// Hardware-facing command derived from a policy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Digital(PinLevel),
    DutyCycle(u8),
}

impl Command {
    pub fn for_level(mode: OutputMode, level: Level) -> Self {
        match mode {
            OutputMode::Digital if level.is_on() => Self::Digital(PinLevel::High),
            OutputMode::Digital => Self::Digital(PinLevel::Low),
            OutputMode::Pwm { .. } => Self::DutyCycle(level.percent()),
        }
    }

    fn apply(self, actuator: &mut dyn Actuator) -> Result<()> {
        match self {
            Self::Digital(level) => actuator.write_digital(level),
            Self::DutyCycle(percent) => actuator.set_duty_cycle(percent),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digital(level) => write!(f, "{level}"),
            Self::DutyCycle(percent) => write!(f, "duty-cycle {percent}/100"),
        }
    }
}

/// Shared handle to the single actuator.
///
/// The controller writes through it during normal operation; the shutdown
/// watcher performs the final write and releases it. Once released every
/// further command fails.
#[derive(Debug, Clone)]
pub struct SharedActuator(Arc<Mutex<Option<Held>>>);

#[derive(Debug)]
struct Held {
    driver: Box<dyn Actuator>,
    mode: Option<PinMode>,
}

impl SharedActuator {
    pub fn new(actuator: Box<dyn Actuator>) -> Self {
        Self(Arc::new(Mutex::new(Some(Held {
            driver: actuator,
            mode: None,
        }))))
    }

    /// Puts the output into `mode` and drives it to full cooling.
    pub async fn configure(&self, mode: OutputMode) -> Result<()> {
        let mut guard = self.0.lock().await;
        let held = guard.as_mut().ok_or_else(released)?;
        let actuator = held.driver.as_mut();

        match mode {
            OutputMode::Digital => {
                actuator.set_mode(PinMode::Digital)?;
                held.mode = Some(PinMode::Digital);
                actuator.write_digital(PinLevel::High)?;
            }
            OutputMode::Pwm { frequency_hz } => {
                actuator.set_mode(PinMode::Pwm)?;
                held.mode = Some(PinMode::Pwm);
                actuator.set_duty_cycle(Level::FULL.percent())?;
                actuator.set_pwm_frequency(frequency_hz)?;
            }
        }
        debug!("Actuator configured for {mode:?}, cooling fully engaged");
        Ok(())
    }

    pub async fn apply(&self, command: Command) -> Result<()> {
        let mut guard = self.0.lock().await;
        let held = guard.as_mut().ok_or_else(released)?;
        command
            .apply(held.driver.as_mut())
            .with_context(|| format!("Failed to apply {command}"))
    }

    /// Forces full cooling, then closes the hardware handle.
    ///
    /// A PWM output is first driven to full duty, then switched to digital
    /// high. Every step is attempted even when an earlier one fails; the
    /// first error is returned. The handle is taken out under the lock, so
    /// no command can reach the hardware after this returns.
    pub async fn engage_safe_state_and_release(&self) -> Result<()> {
        let Held { mut driver, mode } = self.0.lock().await.take().ok_or_else(released)?;

        let full_duty = if mode == Some(PinMode::Pwm) {
            driver
                .set_duty_cycle(Level::FULL.percent())
                .context("Failed to drive PWM output to full duty")
        } else {
            Ok(())
        };
        let switched = driver
            .set_mode(PinMode::Digital)
            .context("Failed to switch actuator to digital mode");
        let forced = driver
            .write_digital(PinLevel::High)
            .context("Failed to force actuator into safe state");
        let closed = driver.close().context("Failed to close actuator");

        for step in [&full_duty, &switched, &forced, &closed] {
            if let Err(e) = step {
                warn!("Safe state incomplete: {e:#}");
            }
        }
        full_duty.and(switched).and(forced).and(closed)?;
        info!("Actuator forced to full cooling and released");
        Ok(())
    }

    pub async fn is_released(&self) -> bool {
        self.0.lock().await.is_none()
    }
}

fn released() -> anyhow::Error {
    anyhow!("Actuator already released")
}
