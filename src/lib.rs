//! # rpifand
//!
//! A Linux daemon that keeps a Raspberry Pi cool by driving a fan from the
//! SoC temperature.
//!
//! ## Features
//!
//! - **Binary mode**: fan on above a threshold, off below it
//! - **Tiered mode**: six temperature tiers mapped to PWM duty cycles
//! - **Smoothing**: decisions use the hottest reading of a sliding window
//! - **Fail-safe**: sensor failures and shutdown both force full cooling
//!
//! ## Architecture
//!
//! Two tasks run under a [`TaskManager`](task_manager::TaskManager):
//! - [`Sampler`](sampler::Sampler) reads the sensor once per interval
//! - [`Controller`](controller::Controller) smooths, evaluates the
//!   [`Policy`](policy::Policy) and writes the actuator on change
//!
//! A [`ShutdownWatcher`](shutdown::ShutdownWatcher) owns the final write
//! on SIGINT or SIGTERM.
//!
//! ## Example
//!
//! ```no_run
//! use rpifand::{application::Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod actuator;
pub mod application;
pub mod cli;
pub mod config;
pub mod controller;
pub mod drivers;
pub mod policy;
pub mod sampler;
pub mod sensors;
pub mod shutdown;
pub mod task_manager;
pub mod temperature_sensors;
pub mod window;
