//! One-shot queries over a short-lived event connection

use std::thread;
use std::time::{Duration, Instant};

use crate::connection::{ConnectionConfig, EventConnection};
use crate::error::Result;
use crate::event::Variable;
use crate::snapshot::EventSnapshot;
use crate::PRODUCT_SERVICE;

/// Connect, subscribe to `service`, return the seeded snapshot and close
pub fn query_state(host: &str, service: &str, config: &ConnectionConfig) -> Result<EventSnapshot> {
    let mut connection = EventConnection::connect(host, config)?;
    let result = connection.subscribe(service);
    connection.close();
    Ok(EventSnapshot::seeded(&result?))
}

/// Poll [`query_state`] until every expected variable has its expected value
///
/// Returns the matching snapshot, or `None` once `timeout` has passed. Query
/// failures along the way count as "not yet".
pub fn wait_for_state(
    host: &str,
    service: &str,
    expected: &[(Variable, &str)],
    timeout: Duration,
    interval: Duration,
    config: &ConnectionConfig,
) -> Option<EventSnapshot> {
    let deadline = Instant::now() + timeout;
    loop {
        match query_state(host, service, config) {
            Ok(snapshot) => {
                if expected
                    .iter()
                    .all(|(variable, value)| snapshot.get(*variable) == Some(*value))
                {
                    return Some(snapshot);
                }
                tracing::debug!(host, "waiting for state, have {}", snapshot.summary());
            }
            Err(e) => tracing::debug!(host, "state query failed: {}", e),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        thread::sleep(interval.min(remaining));
    }
}

/// What a device says about itself on the event port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProbe {
    /// From the `ALIVE Ds <identifier>` announcement
    pub identifier: Option<String>,
    pub room: Option<String>,
    pub name: Option<String>,
}

/// Read a device's identifier (and room/name when offered) from its event port
pub fn probe_device(host: &str, config: &ConnectionConfig) -> Result<DeviceProbe> {
    let mut connection = EventConnection::connect(host, config)?;
    let mut probe = DeviceProbe {
        identifier: connection.identifier().map(str::to_string),
        ..Default::default()
    };

    match connection.subscribe(PRODUCT_SERVICE) {
        Ok(events) => {
            for event in &events {
                if let Some(room) = event.value("ProductRoom") {
                    probe.room = Some(room.to_string());
                }
                if let Some(name) = event.value("ProductName") {
                    probe.name = Some(name.to_string());
                }
            }
        }
        Err(e) => tracing::debug!(host, "product subscription unavailable: {}", e),
    }

    connection.close();
    Ok(probe)
}
