//! Event monitor worker threads
//!
//! One [`EventMonitor`] thread per device owns the device's [`EventConnection`]
//! and [`EventSnapshot`]. Everything it learns is published as [`MonitorEvent`]s
//! on a shared channel, so any number of monitors can feed a single consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::connection::{ConnectionConfig, EventConnection, ShutdownHandle};
use crate::error::Result;
use crate::event::{self, LpecEvent, Variable};
use crate::snapshot::EventSnapshot;
use crate::RECEIVER_SERVICE;

/// Granularity of the interruptible reconnect sleep
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for one monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub connection: ConnectionConfig,
    /// Service path to subscribe to
    pub service: String,
    /// How many times to re-establish a lost connection before giving up
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            service: RECEIVER_SERVICE.to_string(),
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// A recognized variable changed value on one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub device_id: String,
    pub variable: Variable,
    pub old_value: Option<String>,
    pub new_value: String,
    pub sequence: u64,
    /// When the monitor observed the change
    pub at: Instant,
}

/// Everything a monitor publishes on its channel
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Subscription established; carries the seeded snapshot
    Started {
        device_id: String,
        snapshot: EventSnapshot,
    },
    Changed(ChangeNotification),
    ConnectionLost {
        device_id: String,
        reason: String,
    },
    Reconnected {
        device_id: String,
    },
    /// The monitor thread has exited and its socket is closed
    Stopped {
        device_id: String,
    },
}

impl MonitorEvent {
    pub fn device_id(&self) -> &str {
        match self {
            MonitorEvent::Started { device_id, .. }
            | MonitorEvent::ConnectionLost { device_id, .. }
            | MonitorEvent::Reconnected { device_id }
            | MonitorEvent::Stopped { device_id } => device_id,
            MonitorEvent::Changed(change) => &change.device_id,
        }
    }
}

/// Apply one protocol line to a snapshot
///
/// Lines that are not events produce no changes. A malformed event line is a
/// [`LpecError::Parse`] and leaves the snapshot untouched.
pub fn process_line(
    device_id: &str,
    snapshot: &mut EventSnapshot,
    line: &str,
) -> Result<Vec<ChangeNotification>> {
    let line = line.trim();
    if line.is_empty() || !event::is_event_line(line) {
        return Ok(Vec::new());
    }
    let event = event::parse_event(line)?;
    Ok(notifications(device_id, snapshot, &event))
}

fn notifications(device_id: &str, snapshot: &mut EventSnapshot, event: &LpecEvent) -> Vec<ChangeNotification> {
    let at = Instant::now();
    snapshot
        .apply(event)
        .into_iter()
        .map(|change| ChangeNotification {
            device_id: device_id.to_string(),
            variable: change.variable,
            old_value: change.old_value,
            new_value: change.new_value,
            sequence: event.sequence,
            at,
        })
        .collect()
}

/// Entry point for starting monitor threads
pub struct EventMonitor;

impl EventMonitor {
    /// Connect, subscribe and spawn the read loop for one device
    ///
    /// The initial connection is made on the calling thread so that an
    /// unreachable device is reported here rather than on the channel.
    pub fn start(
        device_id: impl Into<String>,
        host: impl Into<String>,
        config: MonitorConfig,
        events: Sender<MonitorEvent>,
    ) -> Result<MonitorHandle> {
        let device_id = device_id.into();
        let host = host.into();

        let (connection, initial) = open(&host, &config)?;
        let snapshot = EventSnapshot::seeded(&initial);
        tracing::info!(device = %device_id, "monitoring {} ({})", host, snapshot.summary());

        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Mutex::new(Some(connection.shutdown_handle()?)));

        let _ = events.send(MonitorEvent::Started {
            device_id: device_id.clone(),
            snapshot: snapshot.clone(),
        });

        let worker = Worker {
            device_id: device_id.clone(),
            host,
            config,
            connection: Some(connection),
            snapshot,
            events,
            stop: Arc::clone(&stop),
            shutdown: Arc::clone(&shutdown),
        };
        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(format!("lpec-{}", device_id))
            .spawn(move || {
                worker.run();
                thread_running.store(false, Ordering::SeqCst);
            })?;

        Ok(MonitorHandle {
            device_id,
            stop,
            running,
            shutdown,
            thread: Some(thread),
        })
    }
}

fn open(host: &str, config: &MonitorConfig) -> Result<(EventConnection, Vec<LpecEvent>)> {
    let mut connection = EventConnection::connect(host, &config.connection)?;
    match connection.subscribe(&config.service) {
        Ok(events) => Ok((connection, events)),
        Err(e) => {
            connection.close();
            Err(e)
        }
    }
}

struct Worker {
    device_id: String,
    host: String,
    config: MonitorConfig,
    connection: Option<EventConnection>,
    snapshot: EventSnapshot,
    events: Sender<MonitorEvent>,
    stop: Arc<AtomicBool>,
    shutdown: Arc<Mutex<Option<ShutdownHandle>>>,
}

impl Worker {
    fn run(mut self) {
        while !self.stopping() {
            let Some(connection) = self.connection.as_mut() else {
                break;
            };

            match connection.next_line() {
                Ok(Some(line)) => self.handle_line(&line),
                Ok(None) => {
                    tracing::debug!(device = %self.device_id, "idle, state: {}", self.snapshot.summary());
                }
                Err(e) => {
                    if self.stopping() {
                        break;
                    }
                    self.drop_connection();
                    tracing::warn!(device = %self.device_id, "event connection lost: {}", e);
                    let _ = self.events.send(MonitorEvent::ConnectionLost {
                        device_id: self.device_id.clone(),
                        reason: e.to_string(),
                    });
                    if !self.reconnect() {
                        break;
                    }
                }
            }
        }

        self.drop_connection();
        tracing::debug!(device = %self.device_id, "monitor stopped");
        let _ = self.events.send(MonitorEvent::Stopped {
            device_id: self.device_id.clone(),
        });
    }

    fn handle_line(&mut self, line: &str) {
        tracing::trace!(device = %self.device_id, "<< {}", line);
        match process_line(&self.device_id, &mut self.snapshot, line) {
            Ok(changes) => self.publish(changes),
            Err(e) => tracing::warn!(device = %self.device_id, "skipping line: {}", e),
        }
    }

    fn publish(&self, changes: Vec<ChangeNotification>) {
        for change in changes {
            tracing::info!(
                device = %self.device_id,
                seq = change.sequence,
                "{}: {} -> {}",
                change.variable,
                change.old_value.as_deref().unwrap_or("-"),
                change.new_value
            );
            if self.events.send(MonitorEvent::Changed(change)).is_err() {
                tracing::debug!(device = %self.device_id, "no listener for notifications");
            }
        }
    }

    fn reconnect(&mut self) -> bool {
        for attempt in 1..=self.config.reconnect_attempts {
            if !self.sleep_unless_stopped(self.config.reconnect_delay) {
                return false;
            }
            tracing::info!(
                device = %self.device_id,
                "reconnecting ({}/{})",
                attempt,
                self.config.reconnect_attempts
            );

            match open(&self.host, &self.config) {
                Ok((connection, initial)) => {
                    match connection.shutdown_handle() {
                        Ok(handle) => *self.shutdown.lock() = Some(handle),
                        Err(e) => {
                            tracing::warn!(device = %self.device_id, "reconnect failed: {}", e);
                            connection.close();
                            continue;
                        }
                    }
                    self.connection = Some(connection);
                    if self.stopping() {
                        return false;
                    }

                    let _ = self.events.send(MonitorEvent::Reconnected {
                        device_id: self.device_id.clone(),
                    });
                    // anything that moved while we were away
                    for event in &initial {
                        let changes = notifications(&self.device_id, &mut self.snapshot, event);
                        self.publish(changes);
                    }
                    return true;
                }
                Err(e) => tracing::warn!(device = %self.device_id, "reconnect failed: {}", e),
            }
        }
        false
    }

    fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stopping() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(STOP_CHECK_INTERVAL));
        }
    }

    fn drop_connection(&mut self) {
        *self.shutdown.lock() = None;
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Owner's handle on a running monitor; stopping or dropping it closes the socket
#[derive(Debug)]
pub struct MonitorHandle {
    device_id: String,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Mutex<Option<ShutdownHandle>>>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Whether the read loop is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the loop to stop, unblock its read and wait for it to exit
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.shutdown.lock().as_ref() {
            handle.shutdown();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(device = %self.device_id, "monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
