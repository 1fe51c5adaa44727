//! Cron runner entry point.
//!
//! Usage: `nodeflow-cron [CONFIG_FILE]`. Without `sweep.repeat` the runner
//! sweeps once and exits, which suits an external cron schedule.

use chrono::Utc;
use nodeflow_cron::{CronConfig, run_once};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_file = std::env::args_os().nth(1).map(PathBuf::from);
    let config = CronConfig::load(config_file.as_deref()).expect("failed to load configuration");
    info!(
        snapshot = %config.snapshot_path.display(),
        cursor = %config.cursor_path().display(),
        repeat = config.sweep.repeat,
        "nodeflow cron starting"
    );

    if !config.sweep.repeat {
        return sweep(&config).await;
    }

    let period = Duration::from_secs(config.sweep.interval_seconds.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep(&config).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return ExitCode::SUCCESS;
            }
        }
    }
}

async fn sweep(config: &CronConfig) -> ExitCode {
    match run_once(config, Utc::now()).await {
        Ok(report) => {
            info!(
                promoted = report.promoted,
                abandoned = report.abandoned,
                failed = report.failed,
                retained = report.retained,
                "sweep finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "sweep failed");
            ExitCode::FAILURE
        }
    }
}
