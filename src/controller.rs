//! Decision side of the pipeline: window, policy and actuation.

use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    actuator::{Command, SharedActuator},
    policy::{Level, OutputMode, Policy},
    sensors::MilliCelsius,
    window::SlidingWindow,
};

/// Consumes samples, keeps the smoothing window and drives the actuator.
///
/// The actuator is only written when the evaluated level differs from the
/// last applied one.
#[derive(Debug)]
pub struct Controller {
    policy: Policy,
    mode: OutputMode,
    window: SlidingWindow,
    state: Level,
    actuator: SharedActuator,
}

impl Controller {
    pub fn new(policy: Policy, tail_range: usize, actuator: SharedActuator) -> Self {
        Self {
            mode: policy.output_mode(),
            policy,
            window: SlidingWindow::new(tail_range),
            state: Level::FULL,
            actuator,
        }
    }

    /// Configures the output for the policy and engages full cooling.
    pub async fn start(&mut self) -> Result<()> {
        self.actuator
            .configure(self.mode)
            .await
            .context("Failed to configure actuator")?;
        self.state = Level::FULL;
        info!("Enter control loop: {}", self.policy.describe());
        Ok(())
    }

    /// Runs one decision cycle.
    ///
    /// Returns the new level when the actuator was written, `None` when the
    /// level was unchanged.
    pub async fn process(&mut self, sample: MilliCelsius) -> Result<Option<Level>> {
        self.window.push(sample);
        let representative = self.window.representative();
        debug!("Current temperature record: {}", self.window);

        let level = self.policy.evaluate(representative);
        if level == self.state {
            return Ok(None);
        }

        let command = Command::for_level(self.mode, level);
        self.actuator.apply(command).await?;
        self.state = level;

        match command {
            Command::Digital(pin) => info!(
                "Toggle fan to {pin} for temperature {representative}: {}",
                self.window
            ),
            Command::DutyCycle(_) => info!(
                "Change PWM duty-cycle to {level} for temperature {representative}: {}",
                self.window
            ),
        }
        Ok(Some(level))
    }

    /// Last applied level.
    pub fn state(&self) -> Level {
        self.state
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Consumes samples until cancelled, the sampler goes away, or the
    /// actuator is released.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<MilliCelsius>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        loop {
            let sample = tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Controller cancelled");
                    return Ok(());
                }
                sample = rx.recv() => match sample {
                    Some(sample) => sample,
                    None => bail!("Sampler stopped publishing"),
                },
            };

            if let Err(e) = self.process(sample).await {
                if self.actuator.is_released().await {
                    info!("Actuator released, controller stopping");
                    return Ok(());
                }
                error!("Actuation failed, keeping {}: {e:#}", self.state);
            }
        }
    }
}
