//! Event-subscription (LPEC) client for Songcast devices
//!
//! Linn-compatible OpenHome devices push state changes over a line-oriented
//! protocol on TCP port 23. This crate provides:
//!
//! - [`EventConnection`]: handshake, subscribe and bounded line reads
//! - [`EventSnapshot`]: last-seen variable values with diffing
//! - [`EventMonitor`]: one worker thread per device publishing [`MonitorEvent`]s
//!   on an `mpsc` channel
//! - one-shot helpers: [`query_state`], [`wait_for_state`], [`probe_device`]
//!
//! ```no_run
//! use std::sync::mpsc;
//! use songcast_lpec::{EventMonitor, MonitorConfig, MonitorEvent};
//!
//! let (tx, rx) = mpsc::channel();
//! let mut monitor = EventMonitor::start("D2", "192.168.1.21", MonitorConfig::default(), tx)?;
//!
//! for event in rx.iter().take(5) {
//!     if let MonitorEvent::Changed(change) = event {
//!         println!("{} {} = {}", change.device_id, change.variable, change.new_value);
//!     }
//! }
//! monitor.stop();
//! # Ok::<(), songcast_lpec::LpecError>(())
//! ```

pub mod connection;
pub mod error;
pub mod event;
pub mod monitor;
pub mod query;
pub mod snapshot;

pub use connection::{ConnectionConfig, EventConnection, ShutdownHandle};
pub use error::{LpecError, Result};
pub use event::{parse_alive, parse_event, Announcement, LpecEvent, Variable};
pub use monitor::{process_line, ChangeNotification, EventMonitor, MonitorConfig, MonitorEvent, MonitorHandle};
pub use query::{probe_device, query_state, wait_for_state, DeviceProbe};
pub use snapshot::{format_sender_uri, EventSnapshot, VariableChange};

/// Well-known event-subscription port
pub const DEFAULT_EVENT_PORT: u16 = 23;

/// Service path of the Songcast receiver
pub const RECEIVER_SERVICE: &str = "Ds/Receiver";

/// Service path carrying product room and name
pub const PRODUCT_SERVICE: &str = "Ds/Product";
