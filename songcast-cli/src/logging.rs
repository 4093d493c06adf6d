//! Tracing setup for the command line tool
//!
//! Diagnostics go to stderr through `tracing`; the summary report is printed
//! to stdout separately, so piping the output keeps only the results.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Songcast crates whose level follows the selected mode
const CRATES: &[&str] = &[
    "songcast",
    "songcast_cli",
    "songcast_group",
    "songcast_lpec",
    "songcast_verify",
    "openhome_api",
    "soap_client",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Progress at info, compact
    Normal,
    /// Debug for the songcast crates, including idle heartbeats
    Verbose,
    /// Trace with source locations and thread ids
    Debug,
}

impl LoggingMode {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        match (verbose, debug) {
            (_, true) => LoggingMode::Debug,
            (true, false) => LoggingMode::Verbose,
            _ => LoggingMode::Normal,
        }
    }

    fn default_directives(self) -> String {
        let level = match self {
            LoggingMode::Normal => return "info".to_string(),
            LoggingMode::Verbose => "debug",
            LoggingMode::Debug => "trace",
        };
        let mut directives = vec!["info".to_string()];
        directives.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
        directives.join(",")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = create_env_filter(&mode.default_directives())?;

    let result = match mode {
        LoggingMode::Normal | LoggingMode::Verbose => Registry::default()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_names(mode == LoggingMode::Verbose)
                    .compact(),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .pretty()
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init(),
    };
    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// `SONGCAST_LOG`, then `RUST_LOG`, then the mode's defaults
fn create_env_filter(default_directives: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("SONGCAST_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_directives.to_string());

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}
