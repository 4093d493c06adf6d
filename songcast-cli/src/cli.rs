use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use songcast_lpec::Variable;

/// Songcast group tool
///
/// Puts the configured receivers into a Songcast group with the configured
/// sender and watches the devices' event streams to confirm it worked.
#[derive(Parser, Debug)]
#[command(name = "songcast")]
#[command(about = "Form and verify Songcast groups on OpenHome devices")]
#[command(version)]
pub struct Cli {
    /// Run configuration file
    #[arg(short, long, global = true, default_value = ".env")]
    pub config: PathBuf,

    /// Debug-level diagnostics for the songcast crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Trace-level diagnostics with source locations and thread ids
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Join every receiver to the sender (default)
    Group(GroupArgs),
    /// Watch the sender and receivers until Ctrl-C
    Monitor(MonitorArgs),
    /// Print the current receiver state of every configured device
    Status(StatusArgs),
    /// Read the identifier a device announces on its event port
    Probe {
        /// Host name or IP address
        address: String,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GroupArgs {
    /// Switch the sender to its Songcast sender source first
    #[arg(long)]
    pub leader_songcast: bool,

    /// Test plan (JSON) to verify while joining
    #[arg(long, value_name = "FILE")]
    pub test: Option<PathBuf>,

    /// Do not watch the devices' event streams
    #[arg(long, conflicts_with = "test")]
    pub no_monitor: bool,

    /// Poll attempts per candidate
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    pub poll_attempts: u32,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Random extra milliseconds, up to this value, added to each poll wait
    #[arg(long, default_value_t = 0)]
    pub poll_jitter_ms: u64,

    /// Do not force the default multicast reference when every candidate fails
    #[arg(long)]
    pub no_last_resort: bool,
}

impl GroupArgs {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_jitter(&self) -> Duration {
        Duration::from_millis(self.poll_jitter_ms)
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct MonitorArgs {
    /// Test plan (JSON); stop once every assertion is settled
    #[arg(long, value_name = "FILE")]
    pub test: Option<PathBuf>,
}

/// `VARIABLE=VALUE`, e.g. `TransportState=Playing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub variable: Variable,
    pub value: String,
}

fn parse_expectation(text: &str) -> Result<Expectation, String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected VARIABLE=VALUE, got '{}'", text))?;
    let variable = Variable::from_name(name.trim())
        .ok_or_else(|| format!("unknown variable '{}' (expected TransportState, Sender, Status or ProtocolInfo)", name.trim()))?;
    Ok(Expectation {
        variable,
        value: value.trim().to_string(),
    })
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct StatusArgs {
    /// Wait until every device reports this value (repeatable)
    #[arg(long = "expect", value_name = "VARIABLE=VALUE", value_parser = parse_expectation)]
    pub expectations: Vec<Expectation>,

    /// How long to wait for the expected values
    #[arg(long = "within", value_name = "SECONDS", default_value_t = 10.0)]
    pub within_seconds: f64,

    /// Only query this device token
    #[arg(long, value_name = "TOKEN")]
    pub device: Option<String>,
}

impl StatusArgs {
    pub fn within(&self) -> Duration {
        Duration::try_from_secs_f64(self.within_seconds).unwrap_or(Duration::ZERO)
    }
}

impl Cli {
    /// The subcommand, defaulting to `group`
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or_else(|| {
            Command::Group(GroupArgs {
                poll_attempts: 8,
                poll_interval_ms: 500,
                ..GroupArgs::default()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_group_is_the_default() {
        let cli = Cli::try_parse_from(["songcast"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(".env"));
        match cli.subcommand() {
            Command::Group(args) => {
                assert_eq!(args.poll_attempts, 8);
                assert_eq!(args.poll_interval(), Duration::from_millis(500));
                assert_eq!(args.poll_jitter(), Duration::ZERO);
                assert!(!args.leader_songcast);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["songcast", "group", "--leader-songcast", "--test", "t.json", "--verbose"])
            .unwrap();
        assert!(cli.verbose);
        let Command::Group(args) = cli.subcommand() else {
            panic!("expected group");
        };
        assert!(args.leader_songcast);
        assert_eq!(args.test, Some(PathBuf::from("t.json")));
    }

    #[test]
    fn test_no_monitor_conflicts_with_test() {
        assert!(Cli::try_parse_from(["songcast", "group", "--no-monitor", "--test", "t.json"]).is_err());
    }

    #[test]
    fn test_probe_requires_address() {
        assert!(Cli::try_parse_from(["songcast", "probe"]).is_err());
        let cli = Cli::try_parse_from(["songcast", "probe", "192.168.1.30"]).unwrap();
        assert_eq!(
            cli.subcommand(),
            Command::Probe {
                address: "192.168.1.30".to_string()
            }
        );
    }

    #[test]
    fn test_poll_jitter_flag() {
        let cli = Cli::try_parse_from(["songcast", "group", "--poll-jitter-ms", "250"]).unwrap();
        let Command::Group(args) = cli.subcommand() else {
            panic!("expected group");
        };
        assert_eq!(args.poll_jitter(), Duration::from_millis(250));
    }

    #[test]
    fn test_status_expectations() {
        let cli = Cli::try_parse_from([
            "songcast",
            "status",
            "--expect",
            "TransportState=Playing",
            "--expect",
            "Uri=ohz://239.255.255.250:51972/udn-1",
            "--within",
            "4.5",
        ])
        .unwrap();
        let Command::Status(args) = cli.subcommand() else {
            panic!("expected status");
        };
        assert_eq!(
            args.expectations,
            vec![
                Expectation {
                    variable: Variable::TransportState,
                    value: "Playing".to_string()
                },
                Expectation {
                    variable: Variable::Sender,
                    value: "ohz://239.255.255.250:51972/udn-1".to_string()
                },
            ]
        );
        assert_eq!(args.within(), Duration::from_millis(4500));
        assert_eq!(args.device, None);
    }

    #[test]
    fn test_status_rejects_bad_expectations() {
        assert!(Cli::try_parse_from(["songcast", "status", "--expect", "Volume=10"]).is_err());
        assert!(Cli::try_parse_from(["songcast", "status", "--expect", "Playing"]).is_err());
    }

    #[test]
    fn test_plain_status() {
        let cli = Cli::try_parse_from(["songcast", "status"]).unwrap();
        let Command::Status(args) = cli.subcommand() else {
            panic!("expected status");
        };
        assert!(args.expectations.is_empty());
    }
}
