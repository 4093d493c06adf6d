//! Wiring of the subcommands onto the library crates

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use openhome_api::OpenHomeClient;
use songcast_group::{Device, DeviceControl, GroupConfig, GroupOrchestrator, JoinConfig, OpenHomeDevice, PollPolicy};
use songcast_lpec::{
    probe_device, query_state, wait_for_state, ConnectionConfig, EventMonitor, MonitorConfig, MonitorHandle, Variable,
    RECEIVER_SERVICE,
};
use songcast_verify::{AssertionEngine, TestPlan, Verifier, VerifierConfig, VerifierOutcome};
use tracing::{error, info, warn};

use crate::cli::{GroupArgs, MonitorArgs, StatusArgs};
use crate::config::{ConfigError, RunConfig};
use crate::report;

/// Monitors plus the verifier consuming their events
struct Watch {
    monitors: Vec<MonitorHandle>,
    verifier: JoinHandle<VerifierOutcome>,
}

impl Watch {
    /// Start assertion timers, the verifier and one monitor per device
    fn start(config: &RunConfig, plan: Option<&TestPlan>, stop_when_settled: bool, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut monitors = Vec::new();
        let monitor_config = MonitorConfig::default();
        // timers start before the first subscription is attempted
        let engine = AssertionEngine::new(plan.map(|p| p.start(Instant::now())).unwrap_or_default());
        if let Some(plan) = plan {
            info!("⏱ {} assertion timer(s) started for '{}'", engine.assertions().len(), plan.name);
        }

        for device in config.all_devices() {
            match EventMonitor::start(device.token.clone(), device.host(), monitor_config.clone(), tx.clone()) {
                Ok(handle) => monitors.push(handle),
                Err(e) => warn!(device = %device.token, "✗ could not start monitor: {}", e),
            }
        }
        drop(tx);

        if monitors.is_empty() {
            warn!("✗ no monitors started");
        } else {
            info!("✓ monitoring {} device(s)", monitors.len());
        }

        let verifier = Verifier::new(
            engine,
            VerifierConfig {
                stop_when_settled,
                monitors: monitors.len(),
                ..VerifierConfig::default()
            },
            shutdown,
        )
        .spawn(rx)
        .context("Failed to spawn verifier thread")?;

        Ok(Self { monitors, verifier })
    }

    fn finish(mut self) -> Option<VerifierOutcome> {
        let outcome = self.verifier.join().ok();
        for monitor in &mut self.monitors {
            monitor.stop();
        }
        outcome
    }
}

fn load_plan(path: Option<&Path>, config: &RunConfig) -> Result<Option<TestPlan>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let plan = TestPlan::load(path).with_context(|| format!("Failed to load test plan {}", path.display()))?;
    for token in plan.devices() {
        if !config.all_devices().any(|d| d.token == token) {
            return Err(ConfigError::UnknownToken {
                key: "test plan",
                token: token.to_string(),
            }
            .into());
        }
    }
    println!("{}", report::plan_header(&plan));
    Ok(Some(plan))
}

fn open_home_devices(config: &RunConfig) -> (OpenHomeDevice, Vec<OpenHomeDevice>) {
    let client = OpenHomeClient::new();
    let sender = OpenHomeDevice::new(config.sender.clone(), client.clone());
    let receivers = config
        .receivers
        .iter()
        .map(|device| OpenHomeDevice::new(device.clone(), client.clone()))
        .collect();
    (sender, receivers)
}

/// Join every receiver, optionally verifying a plan; true on full success
pub fn run_group(config: &RunConfig, args: &GroupArgs, shutdown: Arc<AtomicBool>) -> Result<bool> {
    println!("{}", report::banner("Songcast Group", Local::now()));
    let plan = load_plan(args.test.as_deref(), config)?;

    let watch = if args.no_monitor {
        None
    } else {
        Some(Watch::start(config, plan.as_ref(), plan.is_some(), shutdown.clone())?)
    };

    let group_config = GroupConfig {
        join: JoinConfig {
            poll: PollPolicy::new(args.poll_attempts, args.poll_interval()).with_jitter(args.poll_jitter()),
            last_resort: !args.no_last_resort,
            ..JoinConfig::default()
        },
        prepare_sender_source: args.leader_songcast,
    };

    let (sender, receivers) = open_home_devices(config);
    let receivers: Vec<&dyn DeviceControl> = receivers.iter().map(|r| r as &dyn DeviceControl).collect();
    let group = GroupOrchestrator::new(group_config)
        .with_cancel(shutdown.clone())
        .run(&sender, &receivers);

    println!("{}", report::group_summary(&group));

    let mut success = group.all_joined();
    if let Some(watch) = watch {
        if plan.is_none() {
            // nothing left to wait for once the joins are done
            shutdown.store(true, Ordering::SeqCst);
        } else {
            info!("waiting for assertions to settle (Ctrl-C to stop)");
        }
        let outcome = watch.finish();
        if plan.is_some() {
            success &= plan_verified(outcome.as_ref());
        }
    }

    Ok(success)
}

/// Print the plan results; a verifier that exited without a report is a failure
fn plan_verified(outcome: Option<&VerifierOutcome>) -> bool {
    match outcome {
        Some(outcome) => {
            println!("{}", report::verification_summary(&outcome.report, outcome.reason));
            outcome.report.all_met()
        }
        None => {
            error!("✗ verifier exited without a report, assertions unverified");
            false
        }
    }
}

/// Watch every configured device until Ctrl-C or until the plan settles
pub fn run_monitor(config: &RunConfig, args: &MonitorArgs, shutdown: Arc<AtomicBool>) -> Result<bool> {
    println!("{}", report::banner("Songcast Monitor", Local::now()));
    let plan = load_plan(args.test.as_deref(), config)?;

    let watch = Watch::start(config, plan.as_ref(), plan.is_some(), shutdown)?;
    info!("press Ctrl-C to stop");
    let outcome = watch.finish();

    if let Some(outcome) = &outcome {
        for device in config.all_devices() {
            if let Some(snapshot) = outcome.snapshots.get(&device.token) {
                println!("{}", report::snapshot_line(&device.token, device.host(), snapshot));
            }
        }
    }

    if plan.is_some() {
        return Ok(plan_verified(outcome.as_ref()));
    }
    Ok(outcome.is_some())
}

fn status_devices<'a>(config: &'a RunConfig, args: &StatusArgs) -> Result<Vec<&'a Device>> {
    match &args.device {
        Some(token) => {
            let device = config
                .all_devices()
                .find(|d| &d.token == token)
                .ok_or_else(|| ConfigError::UnknownToken {
                    key: "--device",
                    token: token.clone(),
                })?;
            Ok(vec![device])
        }
        None => Ok(config.all_devices().collect()),
    }
}

/// Receiver state of the configured devices
///
/// With expectations, each device is polled until it reports all of them or
/// the wait runs out.
pub fn run_status(config: &RunConfig, args: &StatusArgs) -> Result<bool> {
    let connection = ConnectionConfig::default();
    let expected: Vec<(Variable, &str)> = args
        .expectations
        .iter()
        .map(|e| (e.variable, e.value.as_str()))
        .collect();

    let mut all_ok = true;
    for device in status_devices(config, args)? {
        if expected.is_empty() {
            match query_state(device.host(), RECEIVER_SERVICE, &connection) {
                Ok(snapshot) => println!("{}", report::snapshot_line(&device.token, device.host(), &snapshot)),
                Err(e) => {
                    all_ok = false;
                    println!("✗ {} ({}): {}", device.token, device.host(), e);
                }
            }
            continue;
        }

        info!(device = %device.token, "waiting up to {:.1}s for expected state", args.within().as_secs_f64());
        match wait_for_state(
            device.host(),
            RECEIVER_SERVICE,
            &expected,
            args.within(),
            Duration::from_millis(500),
            &connection,
        ) {
            Some(snapshot) => println!("{}", report::snapshot_line(&device.token, device.host(), &snapshot)),
            None => {
                all_ok = false;
                println!(
                    "{}",
                    report::expectation_missed(&device.token, device.host(), &args.expectations, args.within())
                );
            }
        }
    }
    Ok(all_ok)
}

pub fn run_probe(address: &str) -> Result<bool> {
    let connection = ConnectionConfig {
        handshake_timeout: Duration::from_secs(3),
        ..ConnectionConfig::default()
    };
    let probe = probe_device(address, &connection).with_context(|| format!("Failed to probe {}", address))?;
    println!("{}", report::probe_line(address, &probe));
    Ok(probe.identifier.is_some())
}
