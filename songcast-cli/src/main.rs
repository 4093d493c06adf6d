use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

pub mod cli;
pub mod config;
pub mod logging;
pub mod report;
pub mod session;

use cli::{Cli, Command};
use config::{ConfigError, RunConfig};
use logging::{init_logging, LoggingMode};
use songcast_verify::PlanError;

/// Exit code for configuration and usage errors
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LoggingMode::from_flags(cli.verbose, cli.debug)) {
        eprintln!("✗ {}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            if is_config_error(&e) {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn is_config_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<ConfigError>().is_some() || error.downcast_ref::<PlanError>().is_some()
}

fn run(cli: &Cli) -> Result<bool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    match cli.subcommand() {
        Command::Group(args) => session::run_group(&load_config(cli)?, &args, shutdown),
        Command::Monitor(args) => session::run_monitor(&load_config(cli)?, &args, shutdown),
        Command::Status(args) => session::run_status(&load_config(cli)?, &args),
        Command::Probe { address } => session::run_probe(&address),
    }
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let config = RunConfig::load(&cli.config)
        .with_context(|| format!("Failed to load run configuration {}", cli.config.display()))?;
    info!(
        sender = %config.sender,
        receivers = config.receivers.len(),
        "configuration loaded from {}",
        cli.config.display()
    );
    Ok(config)
}
