//! Test plan files
//!
//! ```json
//! {
//!   "name": "Kitchen joins living room",
//!   "description": "Receiver should start playing within ten seconds",
//!   "assertions": [
//!     { "device": "DEVICE_2", "variable": "TransportState", "value": "Playing", "within_seconds": 10 }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use songcast_lpec::Variable;

use crate::assertion::Assertion;
use crate::error::{PlanError, Result};

pub const DEFAULT_WITHIN_SECONDS: f64 = 10.0;

/// Longest window a plan may ask for: one day
pub const MAX_WITHIN_SECONDS: f64 = 86_400.0;

fn default_within() -> f64 {
    DEFAULT_WITHIN_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionDef {
    /// Config token of the device
    pub device: String,
    pub variable: String,
    pub value: String,
    #[serde(default = "default_within")]
    pub within_seconds: f64,
}

impl AssertionDef {
    /// The window as a `Duration`, if it is positive and at most [`MAX_WITHIN_SECONDS`]
    pub fn window(&self) -> Option<Duration> {
        if !(self.within_seconds > 0.0 && self.within_seconds <= MAX_WITHIN_SECONDS) {
            return None;
        }
        Duration::try_from_secs_f64(self.within_seconds).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assertions: Vec<AssertionDef>,
}

impl TestPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let plan: TestPlan = serde_json::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        for (index, def) in self.assertions.iter().enumerate() {
            if def.device.trim().is_empty() {
                return Err(PlanError::Invalid(format!("assertion {}: empty device", index + 1)));
            }
            if Variable::from_name(&def.variable).is_none() {
                return Err(PlanError::Invalid(format!(
                    "assertion {}: unknown variable '{}' (expected one of TransportState, Sender, Status, ProtocolInfo)",
                    index + 1,
                    def.variable
                )));
            }
            if def.window().is_none() {
                return Err(PlanError::Invalid(format!(
                    "assertion {}: within_seconds must be positive and at most {}",
                    index + 1,
                    MAX_WITHIN_SECONDS
                )));
            }
        }
        Ok(())
    }

    /// Device tokens referenced by the plan, in first-seen order
    pub fn devices(&self) -> Vec<&str> {
        let mut devices: Vec<&str> = Vec::new();
        for def in &self.assertions {
            if !devices.contains(&def.device.as_str()) {
                devices.push(&def.device);
            }
        }
        devices
    }

    /// Start every assertion at `started`
    pub fn start(&self, started: Instant) -> Vec<Assertion> {
        self.assertions
            .iter()
            .filter_map(|def| {
                let variable = Variable::from_name(&def.variable)?;
                Some(Assertion::new(def.device.clone(), variable, def.value.clone(), def.window()?, started))
            })
            .collect()
    }
}
