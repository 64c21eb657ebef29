//! Periodic temperature sampling.

use std::time::Duration;

use anyhow::{Result, bail};
use log::{debug, error, info};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;

use crate::sensors::{MilliCelsius, TemperatureSensor};

/// Producer side of the sample pipeline.
///
/// Publishes exactly one sample per tick. A failed read publishes `sentinel`
/// instead, so the controller falls back to maximum cooling.
pub struct Sampler {
    sensor: Box<dyn TemperatureSensor>,
    period: Duration,
    sentinel: MilliCelsius,
}

impl Sampler {
    pub fn new(sensor: Box<dyn TemperatureSensor>, period: Duration, sentinel: MilliCelsius) -> Self {
        Self {
            sensor,
            period,
            sentinel,
        }
    }

    /// Reads the sensor once, substituting the sentinel on failure.
    pub async fn sample(&self) -> MilliCelsius {
        match self.sensor.read_temperature().await {
            Ok(temp) => {
                debug!("Temperature of {}: {temp}", self.sensor.sensor_name());
                temp
            }
            Err(e) => {
                error!(
                    "Read temperature from {} failed: {e:#}; reporting {} to force cooling",
                    self.sensor.sensor_name(),
                    self.sentinel
                );
                self.sentinel
            }
        }
    }

    /// Runs until cancelled or until the receiving side goes away.
    ///
    /// The first sample is taken immediately. `tx` is expected to have
    /// capacity 1, so a slow consumer holds back the next tick.
    pub async fn run(self, tx: mpsc::Sender<MilliCelsius>, cancel_token: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(ticker);

        info!(
            "Sampling {} every {:?}",
            self.sensor.sensor_name(),
            self.period
        );

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Sampler cancelled");
                    return Ok(());
                }
                tick = ticks.next() => {
                    if tick.is_none() {
                        bail!("Sampling timer stopped");
                    }
                }
            }

            let temp = tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Sampler cancelled");
                    return Ok(());
                }
                temp = self.sample() => temp,
            };

            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Sampler cancelled");
                    return Ok(());
                }
                sent = tx.send(temp) => {
                    if sent.is_err() {
                        bail!("Controller stopped receiving samples");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    type Script = Arc<Mutex<VecDeque<Result<i64, &'static str>>>>;

    // Replays a fixed script of readings, then keeps failing.
    struct ScriptedSensor {
        script: Script,
    }

    impl ScriptedSensor {
        fn boxed(readings: Vec<Result<i64, &'static str>>) -> Box<dyn TemperatureSensor> {
            Box::new(Self {
                script: Arc::new(Mutex::new(readings.into())),
            })
        }
    }

    #[async_trait]
    impl TemperatureSensor for ScriptedSensor {
        async fn read_temperature(&self) -> Result<MilliCelsius> {
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(t)) => Ok(MilliCelsius(t)),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Err(anyhow!("script exhausted")),
            }
        }

        fn sensor_name(&self) -> String {
            "scripted".to_string()
        }
    }

    const SENTINEL: MilliCelsius = MilliCelsius(100_000);

    #[tokio::test]
    async fn failed_read_yields_sentinel() {
        let sampler = Sampler::new(
            ScriptedSensor::boxed(vec![Ok(41_000), Err("EIO")]),
            Duration::from_secs(1),
            SENTINEL,
        );

        assert_eq!(sampler.sample().await, MilliCelsius(41_000));
        assert_eq!(sampler.sample().await, SENTINEL);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_in_order_and_keeps_going_after_failure() {
        let sampler = Sampler::new(
            ScriptedSensor::boxed(vec![Ok(40_000), Err("EIO"), Ok(42_000)]),
            Duration::from_secs(5),
            SENTINEL,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let handle = tokio::spawn(sampler.run(tx, token.clone()));

        assert_eq!(rx.recv().await, Some(MilliCelsius(40_000)));
        assert_eq!(rx.recv().await, Some(SENTINEL));
        assert_eq!(rx.recv().await, Some(MilliCelsius(42_000)));

        token.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn first_sample_is_immediate_then_paced_by_interval() {
        let sampler = Sampler::new(
            ScriptedSensor::boxed(vec![Ok(1), Ok(2)]),
            Duration::from_secs(5),
            SENTINEL,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let handle = tokio::spawn(sampler.run(tx, token.clone()));

        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(MilliCelsius(1)));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(rx.recv().await, Some(MilliCelsius(2)));
        assert_eq!(start.elapsed(), Duration::from_secs(5));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_with_error_when_receiver_is_dropped() {
        let sampler = Sampler::new(
            ScriptedSensor::boxed(vec![Ok(1)]),
            Duration::from_secs(1),
            SENTINEL,
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = sampler.run(tx, CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("stopped receiving"));
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_handoff_is_cancellable() {
        let sampler = Sampler::new(
            ScriptedSensor::boxed(vec![Ok(1), Ok(2), Ok(3)]),
            Duration::from_secs(1),
            SENTINEL,
        );
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let handle = tokio::spawn(sampler.run(tx, token.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!handle.is_finished());

        token.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}
