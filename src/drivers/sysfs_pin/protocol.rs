use std::path::PathBuf;

use crate::actuator::PinLevel;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Single sysfs attribute write understood by the GPIO and PWM classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ExportGpio { pin: u32 },
    GpioDirectionOut { pin: u32 },
    GpioValue { pin: u32, level: PinLevel },
    ExportPwm { chip: u32, channel: u32 },
    UnexportPwm { chip: u32, channel: u32 },
    PwmPeriod { chip: u32, channel: u32, ns: u64 },
    PwmDutyCycle { chip: u32, channel: u32, ns: u64 },
    PwmEnable { chip: u32, channel: u32, enabled: bool },
}

impl Command {
    /// Attribute path relative to the class root, and the value to write.
    pub fn to_write(&self) -> (PathBuf, String) {
        match *self {
            Command::ExportGpio { pin } => ("gpio/export".into(), pin.to_string()),
            Command::GpioDirectionOut { pin } => {
                (gpio_dir(pin).join("direction"), "out".to_string())
            }
            Command::GpioValue { pin, level } => {
                let value = match level {
                    PinLevel::High => "1",
                    PinLevel::Low => "0",
                };
                (gpio_dir(pin).join("value"), value.to_string())
            }
            Command::ExportPwm { chip, channel } => {
                (pwm_chip_dir(chip).join("export"), channel.to_string())
            }
            Command::UnexportPwm { chip, channel } => {
                (pwm_chip_dir(chip).join("unexport"), channel.to_string())
            }
            Command::PwmPeriod { chip, channel, ns } => {
                (pwm_dir(chip, channel).join("period"), ns.to_string())
            }
            Command::PwmDutyCycle { chip, channel, ns } => {
                (pwm_dir(chip, channel).join("duty_cycle"), ns.to_string())
            }
            Command::PwmEnable {
                chip,
                channel,
                enabled,
            } => (
                pwm_dir(chip, channel).join("enable"),
                if enabled { "1" } else { "0" }.to_string(),
            ),
        }
    }
}

pub fn gpio_dir(pin: u32) -> PathBuf {
    PathBuf::from(format!("gpio/gpio{pin}"))
}

pub fn pwm_chip_dir(chip: u32) -> PathBuf {
    PathBuf::from(format!("pwm/pwmchip{chip}"))
}

pub fn pwm_dir(chip: u32, channel: u32) -> PathBuf {
    pwm_chip_dir(chip).join(format!("pwm{channel}"))
}

/// PWM period in nanoseconds for `hz`, never zero.
pub fn period_ns(hz: u32) -> u64 {
    (NANOS_PER_SECOND / u64::from(hz.max(1))).max(1)
}

/// Active time in nanoseconds for `percent` of `period`.
pub fn duty_ns(period: u64, percent: u8) -> u64 {
    period * u64::from(percent.min(100)) / 100
}
