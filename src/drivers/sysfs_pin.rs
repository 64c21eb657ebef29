//! GPIO/PWM output driven through the Linux sysfs class interfaces.
//!
//! Digital mode uses `/sys/class/gpio/gpio<N>`, PWM mode uses
//! `/sys/class/pwm/pwmchip<C>/pwm<K>`. Closing the driver leaves an exported
//! GPIO in place so the last written level stays latched after exit.

pub mod device_io;
pub mod protocol;

use std::path::Path;

use anyhow::{Result, bail};
use log::{debug, info, warn};

use crate::{
    actuator::{Actuator, PinLevel, PinMode},
    config::ActuatorCfg,
};

use self::{
    device_io::{DeviceIO, SysfsRoot},
    protocol::{Command, duty_ns, gpio_dir, period_ns, pwm_chip_dir, pwm_dir},
};

/// Frequency used until `set_pwm_frequency` is called.
pub const DEFAULT_PWM_HZ: u32 = 25_000;

#[derive(Debug)]
pub struct SysfsPin<Io: DeviceIO> {
    io: Io,
    gpio_pin: u32,
    pwm_chip: u32,
    pwm_channel: u32,
    mode: Option<PinMode>,
    pwm_exported: bool,
    period_ns: u64,
    duty_percent: u8,
    closed: bool,
}

impl SysfsPin<SysfsRoot> {
    /// Acquires the output described by `cfg`.
    ///
    /// Fails when the GPIO class (always needed for the safe state) or, with
    /// `need_pwm`, the PWM chip is not present.
    pub fn open(cfg: &ActuatorCfg, need_pwm: bool) -> Result<Self> {
        let pin = Self::with_io(SysfsRoot::new(&cfg.sysfs_root), cfg);

        if !pin.io.exists(Path::new("gpio")) {
            bail!(
                "GPIO sysfs interface not found below {}",
                cfg.sysfs_root.display()
            );
        }
        if need_pwm && !pin.io.exists(&pwm_chip_dir(cfg.pwm_chip)) {
            bail!(
                "PWM chip {} not found below {}",
                cfg.pwm_chip,
                cfg.sysfs_root.display()
            );
        }

        info!(
            "Acquired output: gpio {} / pwmchip{} channel {}",
            cfg.gpio_pin, cfg.pwm_chip, cfg.pwm_channel
        );
        Ok(pin)
    }
}

impl<Io: DeviceIO + std::fmt::Debug> SysfsPin<Io> {
    pub fn with_io(io: Io, cfg: &ActuatorCfg) -> Self {
        Self {
            io,
            gpio_pin: cfg.gpio_pin,
            pwm_chip: cfg.pwm_chip,
            pwm_channel: cfg.pwm_channel,
            mode: None,
            pwm_exported: false,
            period_ns: period_ns(DEFAULT_PWM_HZ),
            duty_percent: 0,
            closed: false,
        }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        if self.closed {
            bail!("Output already closed");
        }
        let (attr, value) = cmd.to_write();
        debug!("sysfs {} <- {value}", attr.display());
        self.io.write(&attr, &value)
    }

    fn enter_digital(&mut self) -> Result<()> {
        // The GPIO is still claimed when PWM teardown fails; close retries it.
        if self.pwm_exported {
            if let Err(e) = self.leave_pwm() {
                warn!("Releasing PWM channel failed, taking GPIO anyway: {e:#}");
            }
        }
        if !self.io.exists(&gpio_dir(self.gpio_pin)) {
            self.send(Command::ExportGpio { pin: self.gpio_pin })?;
        }
        self.send(Command::GpioDirectionOut { pin: self.gpio_pin })
    }

    fn enter_pwm(&mut self) -> Result<()> {
        let (chip, channel) = (self.pwm_chip, self.pwm_channel);
        if !self.io.exists(&pwm_dir(chip, channel)) {
            self.send(Command::ExportPwm { chip, channel })?;
        }
        self.pwm_exported = true;
        self.send(Command::PwmDutyCycle { chip, channel, ns: 0 })?;
        self.send(Command::PwmPeriod {
            chip,
            channel,
            ns: self.period_ns,
        })?;
        self.send(Command::PwmDutyCycle {
            chip,
            channel,
            ns: duty_ns(self.period_ns, self.duty_percent),
        })?;
        self.send(Command::PwmEnable {
            chip,
            channel,
            enabled: true,
        })
    }

    fn leave_pwm(&mut self) -> Result<()> {
        let (chip, channel) = (self.pwm_chip, self.pwm_channel);
        self.send(Command::PwmEnable {
            chip,
            channel,
            enabled: false,
        })?;
        self.send(Command::UnexportPwm { chip, channel })?;
        self.pwm_exported = false;
        Ok(())
    }

    fn require_mode(&self, mode: PinMode) -> Result<()> {
        match self.mode {
            Some(current) if current == mode => Ok(()),
            other => bail!("Output is in {other:?} mode, expected {mode:?}"),
        }
    }
}

impl<Io: DeviceIO + std::fmt::Debug> Actuator for SysfsPin<Io> {
    fn set_mode(&mut self, mode: PinMode) -> Result<()> {
        match mode {
            PinMode::Digital => self.enter_digital()?,
            PinMode::Pwm => self.enter_pwm()?,
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn write_digital(&mut self, level: PinLevel) -> Result<()> {
        self.require_mode(PinMode::Digital)?;
        self.send(Command::GpioValue {
            pin: self.gpio_pin,
            level,
        })
    }

    fn set_pwm_frequency(&mut self, hz: u32) -> Result<()> {
        if hz == 0 {
            bail!("PWM frequency must be positive");
        }
        self.period_ns = period_ns(hz);
        if self.mode != Some(PinMode::Pwm) {
            return Ok(());
        }

        let (chip, channel) = (self.pwm_chip, self.pwm_channel);
        // duty_cycle may never exceed period, so shrink it first.
        self.send(Command::PwmDutyCycle { chip, channel, ns: 0 })?;
        self.send(Command::PwmPeriod {
            chip,
            channel,
            ns: self.period_ns,
        })?;
        self.send(Command::PwmDutyCycle {
            chip,
            channel,
            ns: duty_ns(self.period_ns, self.duty_percent),
        })
    }

    fn set_duty_cycle(&mut self, percent: u8) -> Result<()> {
        if percent > 100 {
            bail!("Duty cycle {percent} is above 100");
        }
        self.require_mode(PinMode::Pwm)?;
        self.duty_percent = percent;
        self.send(Command::PwmDutyCycle {
            chip: self.pwm_chip,
            channel: self.pwm_channel,
            ns: duty_ns(self.period_ns, percent),
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.pwm_exported {
            self.leave_pwm()?;
        }
        self.closed = true;
        debug!("Output closed in {:?} mode", self.mode);
        Ok(())
    }
}
