//! The single consumer of monitor notifications
//!
//! Every monitor publishes into one channel; the verifier drains it, feeds the
//! [`AssertionEngine`] and expires overdue assertions on a fixed tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use songcast_lpec::{format_sender_uri, EventSnapshot, MonitorEvent, Variable};
use tracing::{debug, info, warn};

use crate::engine::{AssertionEngine, VerificationReport};

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Upper bound on how long one wait for a notification may block
    pub tick: Duration,
    /// Finish as soon as no assertion is pending
    pub stop_when_settled: bool,
    /// Number of monitors publishing into the channel
    pub monitors: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            stop_when_settled: true,
            monitors: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every assertion is met or expired
    Settled,
    /// Every monitor has exited
    MonitorsStopped,
    /// The stop flag was raised
    Stopped,
    /// All senders of the channel were dropped
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct VerifierOutcome {
    pub report: VerificationReport,
    pub reason: FinishReason,
    /// Last known state of each monitored device
    pub snapshots: HashMap<String, EventSnapshot>,
}

pub struct Verifier {
    engine: AssertionEngine,
    config: VerifierConfig,
    stop: Arc<AtomicBool>,
    snapshots: HashMap<String, EventSnapshot>,
    stopped_monitors: usize,
}

impl Verifier {
    pub fn new(engine: AssertionEngine, config: VerifierConfig, stop: Arc<AtomicBool>) -> Self {
        Self {
            engine,
            config,
            stop,
            snapshots: HashMap::new(),
            stopped_monitors: 0,
        }
    }

    /// Run on a dedicated thread named `verifier`
    pub fn spawn(self, events: Receiver<MonitorEvent>) -> std::io::Result<JoinHandle<VerifierOutcome>> {
        thread::Builder::new()
            .name("verifier".to_string())
            .spawn(move || self.run(events))
    }

    /// Consume events until one of the [`FinishReason`]s applies
    pub fn run(mut self, events: Receiver<MonitorEvent>) -> VerifierOutcome {
        let reason = loop {
            let now = Instant::now();
            self.expire(now);

            if self.stop.load(Ordering::SeqCst) {
                break FinishReason::Stopped;
            }
            if self.config.stop_when_settled && !self.engine.is_empty() && self.engine.all_settled() {
                break FinishReason::Settled;
            }
            if self.config.monitors > 0 && self.stopped_monitors >= self.config.monitors {
                break FinishReason::MonitorsStopped;
            }

            // wake up in time for the next deadline, but never later than one tick
            let wait = self
                .engine
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now) + Duration::from_millis(1))
                .map_or(self.config.tick, |until| until.min(self.config.tick));

            match events.recv_timeout(wait) {
                Ok(event) => self.handle(event, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.expire(Instant::now());
                    break FinishReason::Disconnected;
                }
            }
        };

        info!(
            reason = ?reason,
            passed = self.engine.report().passed(),
            pending = self.engine.pending(),
            "Verifier finished"
        );

        VerifierOutcome {
            report: self.engine.report(),
            reason,
            snapshots: self.snapshots,
        }
    }

    fn handle(&mut self, event: MonitorEvent, now: Instant) {
        match event {
            MonitorEvent::Started { device_id, snapshot } => {
                info!(device = %device_id, state = %snapshot.summary(), "Monitoring started");
                // the seeded values are the first observations of this device
                for (variable, value) in snapshot.iter() {
                    self.observe(&device_id, variable, value, now);
                }
                self.snapshots.insert(device_id, snapshot);
            }
            MonitorEvent::Changed(change) => {
                let shown = display_value(change.variable, &change.new_value);
                info!(
                    device = %change.device_id,
                    seq = change.sequence,
                    "{} -> {}",
                    change.variable,
                    shown
                );
                if let Some(snapshot) = self.snapshots.get_mut(&change.device_id) {
                    snapshot.set(change.variable, change.new_value.clone());
                } else {
                    let mut snapshot = EventSnapshot::new();
                    snapshot.set(change.variable, change.new_value.clone());
                    self.snapshots.insert(change.device_id.clone(), snapshot);
                }
                // judge against when the monitor saw it, not when it was dequeued
                self.observe(&change.device_id, change.variable, &change.new_value, change.at);
            }
            MonitorEvent::ConnectionLost { device_id, reason } => {
                warn!(device = %device_id, %reason, "Event connection lost");
            }
            MonitorEvent::Reconnected { device_id } => {
                info!(device = %device_id, "Event connection re-established");
            }
            MonitorEvent::Stopped { device_id } => {
                debug!(device = %device_id, "Monitor stopped");
                self.stopped_monitors += 1;
            }
        }
    }

    fn observe(&mut self, device_id: &str, variable: Variable, value: &str, at: Instant) {
        for assertion in self.engine.observe(device_id, variable, value, at) {
            let elapsed = assertion.elapsed().unwrap_or_default();
            info!("✓ {} (after {:.1}s)", assertion, elapsed.as_secs_f64());
        }
    }

    fn expire(&mut self, now: Instant) {
        for assertion in self.engine.expire_overdue(now) {
            warn!("✗ {} expired", assertion);
        }
    }
}

fn display_value(variable: Variable, value: &str) -> String {
    match variable {
        Variable::Sender => format_sender_uri(value),
        _ => value.to_string(),
    }
}
