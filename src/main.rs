use anyhow::{Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};
use syslog::{BasicLogger, Facility, Formatter3164};

use rpifand::{application::Application, cli::Cli, config::Config};

fn init_log(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "rpifand".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("Failed to connect to syslog: {e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.log_level.into())?;
    info!("Starting rpifand {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(None)?;
    Application::builder()
        .with_config(config)
        .build()?
        .run()
        .await
}
