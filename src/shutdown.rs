//! Termination handling: force the actuator into its safe state on SIGINT or
//! SIGTERM.

use std::future::Future;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::signal::unix::{Signal, SignalKind, signal};

use crate::actuator::SharedActuator;

/// Handlers for the termination signals.
///
/// Installing them early keeps a signal that arrives during start-up from
/// killing the process before the safe state can be written.
pub struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    pub fn install() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
        })
    }

    /// Resolves with the name of the first signal received.
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

/// Waits for a termination request, then performs the final actuator write.
pub struct ShutdownWatcher {
    actuator: SharedActuator,
}

impl ShutdownWatcher {
    pub fn new(actuator: SharedActuator) -> Self {
        Self { actuator }
    }

    /// Blocks until one of `signals` arrives, then engages the safe state.
    pub async fn run(self, signals: TerminationSignals) -> Result<&'static str> {
        self.run_until(signals.recv()).await
    }

    /// Waits for `trigger`, then forces full cooling and releases the
    /// actuator. Returns the trigger's name.
    pub async fn run_until<F>(self, trigger: F) -> Result<&'static str>
    where
        F: Future<Output = &'static str>,
    {
        debug!("Wait for signal");
        let cause = trigger.await;

        info!("Received {cause}, reset fan to full cooling and exit");
        self.actuator.engage_safe_state_and_release().await?;
        Ok(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{MockActuator, PinLevel, PinMode};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    fn safe_state_mock() -> MockActuator {
        let mut mock = MockActuator::new();
        mock.expect_set_mode()
            .with(eq(PinMode::Digital))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_write_digital()
            .with(eq(PinLevel::High))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));
        mock
    }

    #[tokio::test]
    async fn trigger_forces_safe_state_once() {
        let actuator = SharedActuator::new(Box::new(safe_state_mock()));
        let watcher = ShutdownWatcher::new(actuator.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(watcher.run_until(async move {
            let _ = rx.await;
            "SIGTERM"
        }));

        tokio::task::yield_now().await;
        assert!(!actuator.is_released().await);

        tx.send(()).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), "SIGTERM");
        assert!(actuator.is_released().await);
    }

    #[tokio::test]
    async fn safe_state_overrides_last_pwm_command() {
        let mut mock = safe_state_mock();
        mock.expect_set_duty_cycle()
            .with(eq(30))
            .times(1)
            .returning(|_| Ok(()));
        let actuator = SharedActuator::new(Box::new(mock));
        actuator
            .apply(crate::actuator::Command::DutyCycle(30))
            .await
            .unwrap();

        let cause = ShutdownWatcher::new(actuator.clone())
            .run_until(async { "SIGINT" })
            .await
            .unwrap();

        assert_eq!(cause, "SIGINT");
        assert!(
            actuator
                .apply(crate::actuator::Command::DutyCycle(30))
                .await
                .is_err()
        );
    }
}
