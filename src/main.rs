//! sheetstream - Parallel streaming scheduler for spreadsheet-driven AI chat automation
//!
//! Main entry point for the sheetstream CLI.

mod adapters;
mod cli;
mod cmd_marker;
mod cmd_plan;
mod cmd_run;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sheetstream_config::{ConfigLoader, ConfigValidator};

use crate::adapters::sheetstream_dir;
use crate::cli::{Cli, Commands};
use crate::cmd_marker::{handle_config_command, handle_marker_command};
use crate::cmd_plan::handle_plan_command;
use crate::cmd_run::handle_run_command;

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = sheetstream_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("sheetstream")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Plan { grid, json } => handle_plan_command(&config, &grid, json),
        Commands::Run {
            grid,
            test_mode,
            output,
        } => {
            info!("Starting sheetstream v{}", env!("CARGO_PKG_VERSION"));
            for warning in ConfigValidator::validate(&config).into_result()? {
                warn!("Config {}: {}", warning.path, warning.message);
            }
            handle_run_command(&config, &grid, test_mode, output.as_deref()).await
        }
        Commands::Marker { action } => handle_marker_command(&config, action),
        Commands::Config { action } => handle_config_command(&config, action),
    }
}
