//! Per-run cache of friendly device names

use std::collections::HashMap;

use crate::control::DeviceControl;
use crate::device::DeviceNames;

/// Room and product names keyed by device identifier
///
/// Built once per orchestration run and passed to whoever needs names.
/// Entries never expire within a run; failed lookups are not cached so a later
/// caller may try again.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, DeviceNames>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names for `device`, asking it on first use
    pub fn names(&mut self, device: &dyn DeviceControl) -> DeviceNames {
        let identifier = device.device().identifier();
        if let Some(names) = self.names.get(identifier) {
            return names.clone();
        }

        match device.product_identity() {
            Ok(names) => {
                tracing::debug!(
                    device = %device.device().token,
                    "resolved names: room={:?} name={:?}",
                    names.room,
                    names.name
                );
                self.names.insert(identifier.to_string(), names.clone());
                names
            }
            Err(e) => {
                tracing::debug!(device = %device.device().token, "name lookup failed: {}", e);
                DeviceNames::default()
            }
        }
    }

    /// Best human label: room, then product name, then the config token
    pub fn display_name(&mut self, device: &dyn DeviceControl) -> String {
        let names = self.names(device);
        names
            .room
            .or(names.name)
            .unwrap_or_else(|| device.device().token.clone())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
